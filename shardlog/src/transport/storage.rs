//! Storage-tier HTTP endpoints.
//!
//! - `POST /v1/storage?partition=<n>`: body is a JSON array of enriched
//!   entries; answers `ok`
//! - `GET  /v1/read?partition=<n>&limit=<n>`: JSON array of the last
//!   `limit` entries, oldest first
//!
//! File I/O runs on the blocking thread pool.

use std::collections::HashMap;

use axum::{Json, Router};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use tokio::net::TcpListener;

use super::{ApiError, health, required_i64};
use crate::entry::EnrichedEntry;
use crate::error::ValidationError;
use crate::storage::StorageService;

/// Builds the storage-tier router.
pub fn storage_router(service: StorageService) -> Router {
    Router::new()
        .route("/v1/storage", post(handle_store))
        .route("/v1/read", get(handle_read))
        .route("/health", get(health))
        .with_state(service)
}

/// Serves the storage tier on `listener` until the server fails.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve_storage(listener: TcpListener, service: StorageService) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, base_dir = %service.log_store().base_dir().display(), "storage server listening");
    }
    axum::serve(listener, storage_router(service)).await
}

async fn handle_store(
    State(service): State<StorageService>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let partition = required_i64(&params, "partition")?;

    let entries: Vec<EnrichedEntry> =
        serde_json::from_slice(&body).map_err(|e| ValidationError::MalformedBody {
            reason: e.to_string(),
        })?;
    if entries.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }

    tokio::task::spawn_blocking(move || service.store(partition, &entries))
        .await
        .map_err(|e| ApiError::internal(format!("storage task failed: {e}")))?
        .map_err(|e| {
            tracing::warn!(partition, error = %e, "storing logs failed");
            ApiError::bad_request(format!("storing logs failed: {e}"))
        })?;

    Ok("ok")
}

async fn handle_read(
    State(service): State<StorageService>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<EnrichedEntry>>, ApiError> {
    let partition = required_i64(&params, "partition")?;
    let limit = required_i64(&params, "limit")?;

    let entries = tokio::task::spawn_blocking(move || service.read(partition, limit))
        .await
        .map_err(|e| ApiError::internal(format!("storage task failed: {e}")))?
        .map_err(|e| {
            if !e.is_validation() {
                tracing::warn!(partition, limit, error = %e, "reading partition failed");
            }
            ApiError::bad_request(format!("error reading partition: {e}"))
        })?;

    Ok(Json(entries))
}
