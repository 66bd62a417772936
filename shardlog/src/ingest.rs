//! Ingest-tier fan-out and aggregation.
//!
//! [`IngestService::ingest`] enriches a producer batch, groups it by
//! partition, and sends every group to its storage node concurrently. The
//! call returns only after every group has finished, successful or not.
//! Failures are collected per partition into one [`AggregatedError`] so a
//! dead storage node never blocks delivery to healthy partitions.
//!
//! Appends run as detached tasks. Dropping an `ingest` future stops the
//! wait, not the appends already dispatched.
//!
//! The receipt's `received` count is the number of entries accepted for
//! ingestion, not the number confirmed durable.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::client::StorageClient;
use crate::entry::{EnrichedEntry, IncomingEntry, unix_millis};
use crate::error::{AggregatedError, ClientError, PartitionFailure, Result, ValidationError};
use crate::partition::{Partitioner, validate_limit};

/// Node identity used when none is configured.
pub const DEFAULT_NODE_ID: &str = "id-string-1";

/// Client address recorded when the peer address cannot be parsed.
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Extracts the IP part of a `host:port` peer address.
///
/// Returns `"unknown"` when `remote` is not a socket address.
pub fn client_ip_from_remote_addr(remote: &str) -> String {
    remote
        .parse::<SocketAddr>()
        .map_or_else(|_| UNKNOWN_CLIENT_IP.to_string(), |addr| addr.ip().to_string())
}

/// Groups entries by partition, keeping submission order inside each group.
pub fn group_by_partition(
    partitioner: &Partitioner,
    entries: Vec<EnrichedEntry>,
) -> BTreeMap<u32, Vec<EnrichedEntry>> {
    let mut groups: BTreeMap<u32, Vec<EnrichedEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(partitioner.partition_for(entry.service()))
            .or_default()
            .push(entry);
    }
    groups
}

/// Outcome of one ingest call.
#[derive(Debug)]
pub struct IngestReceipt {
    /// Entries accepted for ingestion.
    pub received: usize,
    /// Distinct partitions the batch was dispatched to.
    pub partitions: usize,
    /// Per-partition failures; empty when every partition succeeded.
    pub failures: AggregatedError,
}

impl IngestReceipt {
    /// Returns `true` if every partition append succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts into the accepted count, or the aggregated failures.
    ///
    /// # Errors
    ///
    /// Returns the [`AggregatedError`] if any partition failed.
    pub fn into_result(self) -> std::result::Result<usize, AggregatedError> {
        if self.failures.is_empty() {
            Ok(self.received)
        } else {
            Err(self.failures)
        }
    }
}

/// Stateless ingest front end over a [`StorageClient`].
#[derive(Debug, Clone)]
pub struct IngestService {
    client: Arc<StorageClient>,
    partitioner: Partitioner,
    node_id: Arc<str>,
}

impl IngestService {
    /// Creates a service with the default node id and partition count.
    pub fn new(client: Arc<StorageClient>) -> Self {
        Self {
            client,
            partitioner: Partitioner::default(),
            node_id: Arc::from(DEFAULT_NODE_ID),
        }
    }

    /// Sets the node identity stamped on enriched entries.
    #[must_use]
    pub fn with_node_id(mut self, node_id: impl AsRef<str>) -> Self {
        self.node_id = Arc::from(node_id.as_ref());
        self
    }

    /// Sets the partition space.
    #[must_use]
    pub fn with_partitioner(mut self, partitioner: Partitioner) -> Self {
        self.partitioner = partitioner;
        self
    }

    /// The storage client used for dispatch.
    pub fn client(&self) -> &StorageClient {
        &self.client
    }

    /// The partitioner used for routing.
    pub fn partitioner(&self) -> &Partitioner {
        &self.partitioner
    }

    /// The node identity stamped on enriched entries.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Wraps one incoming entry with receipt metadata.
    pub fn enrich(&self, entry: IncomingEntry, client_ip: &str) -> EnrichedEntry {
        EnrichedEntry::enrich(entry, unix_millis(), &self.node_id, client_ip)
    }

    /// Enriches, partitions, and concurrently stores a producer batch.
    ///
    /// Blocks until every partition's append has completed. Partition
    /// failures do not fail the call; they are reported in the receipt.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyBatch`] if `entries` is empty; nothing
    /// is dispatched in that case.
    pub async fn ingest(
        &self,
        entries: Vec<IncomingEntry>,
        origin_ip: &str,
    ) -> Result<IngestReceipt> {
        if entries.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }

        let received = entries.len();
        let enriched: Vec<EnrichedEntry> = entries
            .into_iter()
            .map(|entry| self.enrich(entry, origin_ip))
            .collect();
        let groups = group_by_partition(&self.partitioner, enriched);
        let partitions = groups.len();

        // Detached tasks: dropping this future must not abort appends that
        // are already in flight.
        let mut tasks: Vec<(u32, usize, JoinHandle<std::result::Result<(), ClientError>>)> =
            Vec::with_capacity(partitions);
        for (partition, group) in groups {
            for entry in &group {
                tracing::debug!(
                    partition,
                    client_ip = %entry.client_ip,
                    received_at = entry.received_at,
                    service = entry.service(),
                    msg = entry.message(),
                    "dispatching entry"
                );
            }

            let client = Arc::clone(&self.client);
            let count = group.len();
            let handle = tokio::spawn(async move { client.append(partition, &group).await });
            tasks.push((partition, count, handle));
        }

        let mut failures = Vec::new();
        for (partition, count, handle) in tasks {
            let error = match handle.await {
                Ok(Ok(())) => {
                    tracing::info!(partition, count, "partition append succeeded");
                    continue;
                }
                Ok(Err(error)) => error,
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                Err(join_error) => ClientError::Cancelled {
                    partition,
                    reason: join_error.to_string(),
                },
            };

            tracing::warn!(partition, count, %error, "partition append failed");
            failures.push(PartitionFailure {
                partition,
                entries: count,
                error,
            });
        }

        Ok(IngestReceipt {
            received,
            partitions,
            failures: AggregatedError::new(failures),
        })
    }

    /// Reads the last `limit` entries of the partition owning `service`.
    ///
    /// The partition may also hold other services' entries; they are
    /// returned as stored.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidLimit`] if `limit < 0`
    /// - any storage client error, unchanged
    pub async fn query(&self, service: &str, limit: i64) -> Result<Vec<EnrichedEntry>> {
        validate_limit(limit)?;
        let partition = self.partitioner.partition_for(service);
        tracing::info!(service, limit, partition, "query");
        self.client.read(partition, limit).await
    }
}
