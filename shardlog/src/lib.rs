//! # shardlog
//!
//! Partitioned append-only log ingestion and storage engine.
//!
//! shardlog accepts structured log entries from producers, routes each entry
//! to one of a fixed number of partitions by hashing its service name, and
//! appends it to a partition-local newline-delimited JSON file. Consumers
//! read back the most recent N entries of a service's partition.
//!
//! ## Key Properties
//!
//! - Deterministic routing: 32-bit FNV-1a of the service name, modulo the
//!   partition count
//! - Concurrent fan-out: one storage call per partition per batch, with
//!   partial failures aggregated instead of failing fast
//! - Append-only storage: files are never truncated or rewritten
//! - Tail reads: the last N records of a partition, oldest first, skipping
//!   corrupt lines
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shardlog::{IncomingEntry, IngestService, RoutingTable, StorageClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Partitions 0-1 on :8081, 2-3 on :8082
//! let client = StorageClient::new(RoutingTable::reference())?;
//! let ingest = IngestService::new(Arc::new(client));
//!
//! let receipt = ingest
//!     .ingest(vec![IncomingEntry::new(1_700_000_000_000, "auth", "login ok")], "203.0.113.5")
//!     .await?;
//! assert!(receipt.is_complete());
//!
//! let recent = ingest.query("auth", 10).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`partition`]: partition assignment for routing keys
//! - [`log_store`]: append-only per-partition files and tail reads
//! - [`storage`]: storage-tier validation boundary
//! - [`routing`]: partition-to-node routing table
//! - [`client`]: ingest-side client for storage nodes
//! - [`ingest`]: enrichment, fan-out, and failure aggregation
//! - [`transport`]: axum routers for both tiers
//! - [`entry`]: wire and on-disk entry types
//! - [`error`]: error types

pub mod client;
pub mod entry;
pub mod error;
pub mod ingest;
pub mod log_store;
pub mod partition;
pub mod routing;
pub mod storage;
pub mod transport;

// Re-export primary API types at crate root for convenience.
pub use client::{ClientConfig, StorageClient};
pub use entry::{EnrichedEntry, IncomingEntry};
pub use error::{AggregatedError, PartitionFailure, Result, ShardlogError};
pub use ingest::{IngestReceipt, IngestService};
pub use log_store::{PartitionLogStore, TailRead};
pub use partition::{PARTITION_COUNT, Partitioner, partition_for};
pub use routing::RoutingTable;
pub use storage::StorageService;
