//! Append-only per-partition log files.
//!
//! Every partition owns one newline-delimited JSON file under the store's
//! base directory. Files are created lazily on first append and only ever
//! grow: there is no compaction, truncation, or in-place update.
//!
//! # File Layout
//!
//! ```text
//! base_dir/
//! ├── partition-0.log     <- one EnrichedEntry JSON object per line
//! ├── partition-1.log
//! └── ...
//! ```
//!
//! # Reads
//!
//! A tail read scans the whole file in order and keeps only the most recent
//! `limit` records, so its cost grows with file size rather than with
//! `limit`. Lines that fail to parse are skipped and counted instead of
//! failing the read.
//!
//! # Concurrency
//!
//! Appends made through one `PartitionLogStore` are serialized per partition
//! with an in-process lock. Locks are striped over a fixed set of mutexes, so
//! partitions sharing a stripe also serialize with each other and memory does
//! not grow with the partition indices callers send. No file lock is taken; a
//! second process writing the same file relies on append-mode write semantics
//! only.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::entry::EnrichedEntry;
use crate::error::{LogStoreError, Result};
use crate::partition::validate_limit;

/// Default base directory for partition log files.
pub const DEFAULT_BASE_DIR: &str = "tmp";

const FILE_PREFIX: &str = "partition-";
const FILE_SUFFIX: &str = ".log";

/// Number of append lock stripes.
const LOCK_STRIPES: u32 = 64;

/// Result of a tail read, with corrupt-record diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailRead {
    /// The most recent records, oldest first.
    pub entries: Vec<EnrichedEntry>,
    /// Well-formed records found in the file.
    pub total: usize,
    /// Non-blank lines that could not be parsed and were skipped.
    pub skipped: usize,
}

/// Append-only log files, one per partition.
#[derive(Debug)]
pub struct PartitionLogStore {
    base_dir: PathBuf,
    /// Append locks, indexed by `partition % LOCK_STRIPES`.
    locks: Box<[Mutex<()>]>,
}

impl PartitionLogStore {
    /// Creates a store rooted at `base_dir`.
    ///
    /// Nothing is touched on disk until the first append.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// The directory holding the partition files.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the log file backing `partition`.
    pub fn partition_path(&self, partition: u32) -> PathBuf {
        self.base_dir
            .join(format!("{FILE_PREFIX}{partition}{FILE_SUFFIX}"))
    }

    /// Appends one entry to the partition's log.
    ///
    /// The file is opened in append mode (created if absent), the record is
    /// written as a single newline-terminated line, flushed, and closed
    /// before returning.
    ///
    /// # Errors
    ///
    /// - [`LogStoreError::Encode`] if the entry cannot be serialized
    /// - [`LogStoreError::AppendFailed`] if the file cannot be opened or written
    pub fn append(&self, partition: u32, entry: &EnrichedEntry) -> Result<()> {
        let _guard = self
            .partition_lock(partition)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.append_record(partition, entry)
    }

    /// Appends entries in order, stopping at the first failure.
    ///
    /// Entries written before a failure stay in the log. The partition lock
    /// is held for the whole batch so the records land contiguously.
    ///
    /// # Errors
    ///
    /// Returns the error of the first entry that failed to append.
    pub fn append_batch(&self, partition: u32, entries: &[EnrichedEntry]) -> Result<()> {
        let _guard = self
            .partition_lock(partition)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for entry in entries {
            self.append_record(partition, entry)?;
        }

        tracing::info!(partition, count = entries.len(), "appended batch");
        Ok(())
    }

    /// Returns the last `limit` entries of the partition, oldest first.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidLimit`](crate::error::ValidationError::InvalidLimit) if `limit < 0`
    /// - [`LogStoreError::PartitionNotFound`] if the partition was never written
    /// - [`LogStoreError::ReadFailed`] on any other I/O failure
    pub fn read(&self, partition: u32, limit: i64) -> Result<Vec<EnrichedEntry>> {
        self.read_tail(partition, limit).map(|tail| tail.entries)
    }

    /// Like [`read`](Self::read), also reporting how many lines were skipped.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn read_tail(&self, partition: u32, limit: i64) -> Result<TailRead> {
        let limit = validate_limit(limit)?;
        let path = self.partition_path(partition);

        let file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                LogStoreError::PartitionNotFound {
                    partition,
                    path: path.clone(),
                }
            } else {
                LogStoreError::ReadFailed {
                    partition,
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        if limit == 0 {
            return Ok(TailRead::default());
        }

        let tail = scan_tail(file, limit).map_err(|e| LogStoreError::ReadFailed {
            partition,
            path: path.clone(),
            source: e,
        })?;

        if tail.skipped > 0 {
            tracing::warn!(
                partition,
                skipped = tail.skipped,
                "skipped unparsable records during read"
            );
        }
        tracing::debug!(partition, limit, returned = tail.entries.len(), "tail read");

        Ok(tail)
    }

    /// Lists partitions that currently have a log file, in ascending order.
    ///
    /// A missing base directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::DirectoryAccess`] if the directory exists but
    /// cannot be listed.
    pub fn partitions(&self) -> Result<Vec<u32>> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LogStoreError::DirectoryAccess {
                    path: self.base_dir.clone(),
                    source: e,
                }
                .into());
            }
        };

        let mut partitions: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_partition_file_name(&entry.file_name().to_string_lossy()))
            .collect();
        partitions.sort_unstable();
        Ok(partitions)
    }

    fn partition_lock(&self, partition: u32) -> &Mutex<()> {
        &self.locks[(partition % LOCK_STRIPES) as usize]
    }

    /// Writes one record; the caller holds the partition lock.
    fn append_record(&self, partition: u32, entry: &EnrichedEntry) -> Result<()> {
        let path = self.partition_path(partition);

        let mut line =
            serde_json::to_vec(entry).map_err(|e| LogStoreError::Encode { source: e })?;
        line.push(b'\n');

        let append_failed = |source| LogStoreError::AppendFailed {
            partition,
            path: path.clone(),
            source,
        };

        let mut file = match open_append(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // The base directory does not exist yet.
                fs::create_dir_all(&self.base_dir).map_err(|e| LogStoreError::DirectoryAccess {
                    path: self.base_dir.clone(),
                    source: e,
                })?;
                open_append(&path).map_err(append_failed)?
            }
            Err(e) => return Err(append_failed(e).into()),
        };

        // One write_all per record keeps each line in a single append.
        file.write_all(&line).map_err(append_failed)?;
        file.flush().map_err(append_failed)?;

        tracing::debug!(
            partition,
            service = entry.service(),
            client_ip = %entry.client_ip,
            received_at = entry.received_at,
            "appended record"
        );
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Scans every line of `file`, keeping the last `limit` well-formed records.
fn scan_tail(file: File, limit: usize) -> io::Result<TailRead> {
    let mut reader = BufReader::new(file);
    let mut window: VecDeque<EnrichedEntry> = VecDeque::with_capacity(limit.min(1024));
    let mut total = 0;
    let mut skipped = 0;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        let record = line.trim_ascii();
        if record.is_empty() {
            continue;
        }

        match serde_json::from_slice::<EnrichedEntry>(record) {
            Ok(entry) => {
                total += 1;
                if window.len() == limit {
                    window.pop_front();
                }
                window.push_back(entry);
            }
            Err(_) => skipped += 1,
        }
    }

    Ok(TailRead {
        entries: window.into(),
        total,
        skipped,
    })
}

/// Extracts `N` from a `partition-N.log` file name.
fn parse_partition_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}
