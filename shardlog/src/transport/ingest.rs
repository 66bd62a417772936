//! Ingest-tier HTTP endpoints.
//!
//! - `POST /v1/logs`: body is a JSON array of incoming entries; answers
//!   `{"received": n}`
//! - `GET  /v1/query?service=<s>&limit=<n>`: JSON array of enriched
//!   entries, oldest first
//!
//! The producer's IP is taken from the connection's peer address, so the
//! router must be served with connect info (see [`serve_ingest`]).

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{Json, Router};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use super::{ApiError, health, required_i64};
use crate::entry::{EnrichedEntry, IncomingEntry};
use crate::error::ValidationError;
use crate::ingest::{IngestService, UNKNOWN_CLIENT_IP, client_ip_from_remote_addr};

/// Body of a successful `POST /v1/logs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Entries accepted for ingestion.
    pub received: usize,
}

/// Builds the ingest-tier router.
pub fn ingest_router(service: IngestService) -> Router {
    Router::new()
        .route("/v1/logs", post(handle_logs))
        .route("/v1/query", get(handle_query))
        .route("/health", get(health))
        .with_state(service)
}

/// Serves the ingest tier on `listener`, recording peer addresses.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve_ingest(listener: TcpListener, service: IngestService) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, node_id = service.node_id(), "ingest server listening");
    }
    axum::serve(
        listener,
        ingest_router(service).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

async fn handle_logs(
    State(service): State<IngestService>,
    remote: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let entries: Vec<IncomingEntry> =
        serde_json::from_slice(&body).map_err(|e| ValidationError::MalformedBody {
            reason: format!("invalid json: {e}"),
        })?;
    if entries.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }

    let client_ip = remote.map_or_else(
        || UNKNOWN_CLIENT_IP.to_string(),
        |ConnectInfo(addr)| client_ip_from_remote_addr(&addr.to_string()),
    );

    let receipt = service
        .ingest(entries, &client_ip)
        .await
        .map_err(|e| ApiError::bad_request(format!("error at ingest node: {e}")))?;

    tracing::info!(
        %client_ip,
        received = receipt.received,
        partitions = receipt.partitions,
        failed = receipt.failures.len(),
        "ingested batch"
    );

    let received = receipt
        .into_result()
        .map_err(|e| ApiError::bad_request(format!("error at ingest node: {e}")))?;

    Ok(Json(IngestResponse { received }))
}

async fn handle_query(
    State(service): State<IngestService>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<EnrichedEntry>>, ApiError> {
    let service_name = params.get("service").cloned().unwrap_or_default();
    let limit = required_i64(&params, "limit")?;
    if limit < 0 {
        return Err(ValidationError::InvalidLimit { limit }.into());
    }

    let entries = service.query(&service_name, limit).await.map_err(|e| {
        if !e.is_validation() {
            tracing::warn!(service = %service_name, limit, error = %e, "query failed");
        }
        ApiError::bad_request(format!("error reading from storage node: {e}"))
    })?;

    Ok(Json(entries))
}
