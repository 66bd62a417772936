//! Partition assignment for routing keys.
//!
//! Routing keys (service names) are hashed with 32-bit FNV-1a and reduced
//! modulo the partition count. The mapping depends only on the key bytes and
//! the partition count, so it stays stable across routing table changes.

use crate::error::{ConfigError, Result, ValidationError};

/// Partition count of the reference deployment.
pub const PARTITION_COUNT: u32 = 4;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Computes the 32-bit FNV-1a hash of `bytes`.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Maps a routing key to a partition in `[0, PARTITION_COUNT)`.
pub fn partition_for(key: &str) -> u32 {
    Partitioner::default().partition_for(key)
}

/// Maps routing keys onto a fixed partition space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    count: u32,
}

impl Partitioner {
    /// Creates a partitioner over `count` partitions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroPartitions`] if `count` is zero.
    pub fn new(count: u32) -> Result<Self> {
        if count == 0 {
            return Err(ConfigError::ZeroPartitions.into());
        }
        Ok(Self { count })
    }

    /// Number of partitions in the space.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the partition index for `key`.
    pub fn partition_for(&self, key: &str) -> u32 {
        fnv1a_32(key.as_bytes()) % self.count
    }
}

impl Default for Partitioner {
    fn default() -> Self {
        Self {
            count: PARTITION_COUNT,
        }
    }
}

/// Checks a raw partition index from the wire.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidPartition`] for negative values or
/// values beyond `u32::MAX`.
pub fn validate_partition(partition: i64) -> std::result::Result<u32, ValidationError> {
    u32::try_from(partition).map_err(|_| ValidationError::InvalidPartition { partition })
}

/// Checks a raw tail-read limit.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidLimit`] for negative values.
pub fn validate_limit(limit: i64) -> std::result::Result<usize, ValidationError> {
    usize::try_from(limit).map_err(|_| ValidationError::InvalidLimit { limit })
}
