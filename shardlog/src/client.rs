//! HTTP client for the storage tier.
//!
//! The ingest tier reaches storage nodes only through [`StorageClient`]. It
//! resolves a partition to a node through the [`RoutingTable`] and speaks the
//! storage tier's JSON endpoints:
//!
//! - `POST <node>/v1/storage?partition=<p>` with a JSON array of entries
//! - `GET  <node>/v1/read?partition=<p>&limit=<n>`
//!
//! Failures are never retried. Connection-level problems surface as
//! [`ClientError::Transport`], non-success statuses as [`ClientError::Remote`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::entry::EnrichedEntry;
use crate::error::{ClientError, Result};
use crate::partition::validate_limit;
use crate::routing::RoutingTable;

/// Transport settings for the storage client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Per-request timeout. `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The ingest tier's handle on the storage tier.
#[derive(Debug)]
pub struct StorageClient {
    http: reqwest::Client,
    routing: RwLock<Arc<RoutingTable>>,
}

impl StorageClient {
    /// Creates a client with default transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ClientCreate`] if the HTTP client cannot be built.
    pub fn new(routing: RoutingTable) -> Result<Self> {
        Self::with_config(routing, ClientConfig::default())
    }

    /// Creates a client with explicit transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ClientCreate`] if the HTTP client cannot be built.
    pub fn with_config(routing: RoutingTable, config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::ClientCreate { source: e })?;

        Ok(Self {
            http,
            routing: RwLock::new(Arc::new(routing)),
        })
    }

    /// Snapshot of the current routing table.
    pub fn routing(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.routing.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the routing table wholesale.
    ///
    /// Meant for configuration time. Requests already in flight keep the
    /// address they resolved; no ordering is promised between a
    /// reconfiguration and concurrent traffic.
    pub fn reconfigure(&self, routing: RoutingTable) {
        let mut current = self.routing.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(routing);
        tracing::info!("storage routing table replaced");
    }

    /// Base URL of the storage node for `partition`.
    ///
    /// Unmapped partitions resolve to the table's default address.
    pub fn resolve_address(&self, partition: u32) -> String {
        self.routing().resolve(partition).to_string()
    }

    /// Sends `entries` to the storage node owning `partition`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] if the node cannot be reached
    /// - [`ClientError::Remote`] if the node answers with a non-2xx status
    pub async fn append(
        &self,
        partition: u32,
        entries: &[EnrichedEntry],
    ) -> std::result::Result<(), ClientError> {
        let url = format!(
            "{}/v1/storage?partition={partition}",
            self.resolve_address(partition)
        );

        let response = self
            .http
            .post(&url)
            .json(entries)
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Remote {
                url,
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        tracing::debug!(partition, count = entries.len(), %url, "appended to storage node");
        Ok(())
    }

    /// Reads the last `limit` entries of `partition` from its storage node.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidLimit`](crate::error::ValidationError::InvalidLimit)
    ///   if `limit < 0`, before any network I/O
    /// - [`ClientError::Transport`] if the node cannot be reached
    /// - [`ClientError::Remote`] if the node answers with anything but 200
    /// - [`ClientError::Decode`] if the body is not a JSON array of entries
    pub async fn read(&self, partition: u32, limit: i64) -> Result<Vec<EnrichedEntry>> {
        let limit = validate_limit(limit)?;
        let url = format!(
            "{}/v1/read?partition={partition}&limit={limit}",
            self.resolve_address(partition)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Remote {
                url,
                status: status.as_u16(),
                body: body.trim().to_string(),
            }
            .into());
        }

        let entries = response
            .json::<Vec<EnrichedEntry>>()
            .await
            .map_err(|e| ClientError::Decode { url, source: e })?;
        Ok(entries)
    }
}
