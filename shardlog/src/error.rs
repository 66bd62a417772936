//! Error types for the shardlog ingestion and storage engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all shardlog operations.
///
/// Each variant corresponds to one error kind surfaced across the ingest and
/// storage tiers. None of them are retried anywhere in the crate.
#[derive(Error, Debug)]
pub enum ShardlogError {
    /// Malformed, empty, or out-of-range client input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Local filesystem failure in the partition log store.
    #[error("log store error: {0}")]
    LogStore(#[from] LogStoreError),

    /// Failure talking to a storage node.
    #[error("storage client error: {0}")]
    Client(#[from] ClientError),

    /// One or more partitions failed during a multi-partition ingest.
    #[error("ingest error: {0}")]
    Ingest(#[from] AggregatedError),

    /// Invalid process configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl ShardlogError {
    /// Returns `true` if this error was caused by invalid caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Errors caused by invalid input from a caller.
///
/// These always map to HTTP 400 and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A write carried no entries.
    #[error("entry batch is empty")]
    EmptyBatch,

    /// A partition index was negative or too large to address.
    #[error("invalid partition {partition}: must be a non-negative integer")]
    InvalidPartition {
        /// The rejected partition value.
        partition: i64,
    },

    /// A tail-read limit was negative.
    #[error("invalid limit {limit}: must be a non-negative integer")]
    InvalidLimit {
        /// The rejected limit value.
        limit: i64,
    },

    /// A required request parameter was absent.
    #[error("missing parameter '{name}'")]
    MissingParameter {
        /// The parameter name.
        name: &'static str,
    },

    /// A request parameter could not be parsed.
    #[error("invalid value '{value}' for parameter '{name}'")]
    InvalidParameter {
        /// The parameter name.
        name: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },

    /// A request body could not be decoded.
    #[error("malformed body: {reason}")]
    MalformedBody {
        /// Decoder error description.
        reason: String,
    },
}

/// Errors from the partition log store (the `IOFailure` kind).
#[derive(Error, Debug)]
pub enum LogStoreError {
    /// The partition has never been written, so no log file exists.
    #[error("partition {partition} has no log file at '{}'", path.display())]
    PartitionNotFound {
        /// The partition index.
        partition: u32,
        /// The expected log file path.
        path: PathBuf,
    },

    /// Opening or writing the partition log failed.
    #[error("failed to append to partition {partition} log '{}': {source}", path.display())]
    AppendFailed {
        /// The partition index.
        partition: u32,
        /// The log file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Opening or reading the partition log failed.
    #[error("failed to read partition {partition} log '{}': {source}", path.display())]
    ReadFailed {
        /// The partition index.
        partition: u32,
        /// The log file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be encoded as a JSON record.
    #[error("failed to encode log record: {source}")]
    Encode {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The base directory could not be created or listed.
    #[error("failed to access log directory '{}': {source}", path.display())]
    DirectoryAccess {
        /// The directory path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the storage client when calling a storage node.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to build the HTTP client.
    #[error("failed to create HTTP client: {source}")]
    ClientCreate {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The storage node could not be reached (`TransportError`).
    #[error("request to '{url}' failed: {source}")]
    Transport {
        /// The request URL.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The storage node answered with a failure status (`RemoteError`).
    #[error("storage returned {status} for '{url}': {body}")]
    Remote {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The response body text.
        body: String,
    },

    /// The storage node's response body could not be decoded.
    #[error("failed to decode response from '{url}': {source}")]
    Decode {
        /// The request URL.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The append task was cancelled before it finished, e.g. at runtime
    /// shutdown.
    #[error("append to partition {partition} was cancelled: {reason}")]
    Cancelled {
        /// The partition whose append was cancelled.
        partition: u32,
        /// The runtime's description of the cancellation.
        reason: String,
    },
}

impl ClientError {
    /// Returns the HTTP status for remote failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors in process or library configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The partition space must hold at least one partition.
    #[error("partition count must be > 0")]
    ZeroPartitions,

    /// A routing table entry could not be parsed.
    #[error("invalid route '{entry}': {reason}")]
    InvalidRoute {
        /// The offending entry text.
        entry: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A single partition's failure during a fan-out append.
#[derive(Debug)]
pub struct PartitionFailure {
    /// The partition whose append failed.
    pub partition: u32,
    /// Number of entries that were destined for the partition.
    pub entries: usize,
    /// What went wrong.
    pub error: ClientError,
}

impl fmt::Display for PartitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to append {} entries to partition {}: {}",
            self.entries, self.partition, self.error
        )
    }
}

/// Compound error collecting every per-partition failure of one ingest.
///
/// Failures are ordered by partition index.
#[derive(Debug, Default)]
pub struct AggregatedError {
    failures: Vec<PartitionFailure>,
}

impl AggregatedError {
    /// Builds an aggregate from individual failures, sorting them by partition.
    pub fn new(mut failures: Vec<PartitionFailure>) -> Self {
        failures.sort_by_key(|f| f.partition);
        Self { failures }
    }

    /// The individual partition failures.
    pub fn failures(&self) -> &[PartitionFailure] {
        &self.failures
    }

    /// Partitions that failed, in ascending order.
    pub fn partitions(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.partition).collect()
    }

    /// Returns `true` when no partition failed.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed partitions.
    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for failure in &self.failures {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}

/// Type alias for `Result<T, ShardlogError>`.
pub type Result<T> = std::result::Result<T, ShardlogError>;
