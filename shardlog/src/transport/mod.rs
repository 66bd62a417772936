//! HTTP endpoints for the storage and ingest tiers.
//!
//! Both tiers are thin axum routers over the library services:
//!
//! - [`storage`]: `POST /v1/storage`, `GET /v1/read`
//! - [`ingest`]: `POST /v1/logs`, `GET /v1/query`
//!
//! Every tier also answers `GET /health`. Error responses are plain text
//! bodies with status 400 for any client or downstream failure; methods not
//! routed for a path get 405 from the router.

pub mod ingest;
pub mod storage;

use std::collections::HashMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ValidationError;

pub use ingest::{IngestResponse, ingest_router, serve_ingest};
pub use storage::{serve_storage, storage_router};

/// A plain-text error response.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, format!("{}\n", self.message)).into_response()
    }
}

/// `GET /health` on either tier.
pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Reads a required integer query parameter.
pub(crate) fn required_i64(
    params: &HashMap<String, String>,
    name: &'static str,
) -> Result<i64, ValidationError> {
    let raw = params
        .get(name)
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::MissingParameter { name })?;

    raw.trim()
        .parse()
        .map_err(|_| ValidationError::InvalidParameter {
            name,
            value: raw.clone(),
        })
}
