//! Storage-tier service boundary.
//!
//! [`StorageService`] validates raw partition and limit values arriving from
//! the wire and delegates to the [`PartitionLogStore`]. Storage nodes do not
//! know the partition count; any non-negative partition is accepted.

use std::path::Path;
use std::sync::Arc;

use crate::entry::EnrichedEntry;
use crate::error::{Result, ValidationError};
use crate::log_store::{PartitionLogStore, TailRead};
use crate::partition::{validate_limit, validate_partition};

/// Validating front of a partition log store.
#[derive(Debug, Clone)]
pub struct StorageService {
    store: Arc<PartitionLogStore>,
}

impl StorageService {
    /// Creates a service over an existing log store.
    pub fn new(store: Arc<PartitionLogStore>) -> Self {
        Self { store }
    }

    /// Creates a service storing partition logs under `base_dir`.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Self {
        Self::new(Arc::new(PartitionLogStore::new(base_dir)))
    }

    /// The underlying log store.
    pub fn log_store(&self) -> &PartitionLogStore {
        &self.store
    }

    /// Appends `entries` to `partition` in order.
    ///
    /// Entries are not rolled back if a later one fails.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidPartition`] if `partition < 0`
    /// - [`ValidationError::EmptyBatch`] if `entries` is empty; nothing is written
    /// - the first append failure from the log store
    pub fn store(&self, partition: i64, entries: &[EnrichedEntry]) -> Result<()> {
        let partition = validate_partition(partition)?;
        if entries.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }

        for entry in entries {
            tracing::debug!(
                partition,
                client_ip = %entry.client_ip,
                received_at = entry.received_at,
                service = entry.service(),
                msg = entry.message(),
                "storing entry"
            );
        }

        self.store.append_batch(partition, entries)
    }

    /// Returns the last `limit` entries of `partition`, oldest first.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidPartition`] if `partition < 0`
    /// - [`ValidationError::InvalidLimit`] if `limit < 0`
    /// - the log store's read failure, including a never-written partition
    pub fn read(&self, partition: i64, limit: i64) -> Result<Vec<EnrichedEntry>> {
        self.read_tail(partition, limit).map(|tail| tail.entries)
    }

    /// Like [`read`](Self::read), with skipped-record diagnostics.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn read_tail(&self, partition: i64, limit: i64) -> Result<TailRead> {
        let partition = validate_partition(partition)?;
        validate_limit(limit)?;

        let tail = self.store.read_tail(partition, limit)?;
        tracing::info!(partition, limit, returned = tail.entries.len(), "read partition");
        Ok(tail)
    }
}
