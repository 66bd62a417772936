//! Shared helpers for integration tests: in-process storage and ingest servers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::any;
use shardlog::transport::{serve_ingest, serve_storage};
use shardlog::{IngestService, RoutingTable, StorageClient, StorageService};
use tokio::net::TcpListener;

/// Starts a storage node over `dir` and returns its base URL.
pub async fn spawn_storage(dir: &Path) -> (String, StorageService) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = StorageService::open(dir);
    tokio::spawn(serve_storage(listener, service.clone()));
    (format!("http://{addr}"), service)
}

/// Starts an ingest node over `routing` and returns its base URL.
pub async fn spawn_ingest(routing: RoutingTable) -> (String, IngestService) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = StorageClient::new(routing).unwrap();
    let service = IngestService::new(Arc::new(client));
    tokio::spawn(serve_ingest(listener, service.clone()));
    (format!("http://{addr}"), service)
}

/// Starts a node that answers every request with `status`.
pub async fn spawn_failing_node(status: StatusCode) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(any(move || async move { (status, "node unavailable") }));
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{addr}")
}

/// A base URL on which nothing is listening.
pub fn unreachable_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
