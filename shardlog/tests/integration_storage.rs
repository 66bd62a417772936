//! Integration tests for the storage tier over HTTP.
//!
//! Each test starts a real storage node on an ephemeral port and talks to it
//! with reqwest and with the library's `StorageClient`.

mod common;

use axum::http::StatusCode;
use shardlog::error::{ClientError, ShardlogError, ValidationError};
use shardlog::{EnrichedEntry, IncomingEntry, RoutingTable, StorageClient};
use tempfile::tempdir;

fn entry(service: &str, message: &str) -> EnrichedEntry {
    EnrichedEntry::enrich(
        IncomingEntry::new(1_700_000_000_000, service, message).with_level("INFO"),
        1_700_000_000_250,
        "id-string-1",
        "127.0.0.1",
    )
}

#[tokio::test]
async fn test_store_then_read_over_http() {
    let dir = tempdir().unwrap();
    let (url, service) = common::spawn_storage(dir.path()).await;
    let http = reqwest::Client::new();

    let entries = vec![entry("svc", "one"), entry("svc", "two")];
    let response = http
        .post(format!("{url}/v1/storage?partition=2"))
        .json(&entries)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");

    // The data is in partition 2's file.
    assert_eq!(service.read(2, 10).unwrap(), entries);

    let response = http
        .get(format!("{url}/v1/read?partition=2&limit=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let read: Vec<EnrichedEntry> = response.json().await.unwrap();
    assert_eq!(read, vec![entries[1].clone()]);
}

#[tokio::test]
async fn test_store_rejects_bad_requests() {
    let dir = tempdir().unwrap();
    let (url, service) = common::spawn_storage(dir.path()).await;
    let http = reqwest::Client::new();
    let body = vec![entry("svc", "m")];

    let cases = [
        format!("{url}/v1/storage"),
        format!("{url}/v1/storage?partition="),
        format!("{url}/v1/storage?partition=abc"),
        format!("{url}/v1/storage?partition=-1"),
    ];
    for target in cases {
        let response = http.post(&target).json(&body).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{target}");
    }

    let empty = http
        .post(format!("{url}/v1/storage?partition=0"))
        .json(&Vec::<EnrichedEntry>::new())
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);

    let malformed = http
        .post(format!("{url}/v1/storage?partition=0"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), reqwest::StatusCode::BAD_REQUEST);

    // None of the rejected requests wrote anything.
    assert!(service.log_store().partitions().unwrap().is_empty());
}

#[tokio::test]
async fn test_store_io_failure_is_400() {
    let dir = tempdir().unwrap();
    let (url, service) = common::spawn_storage(dir.path()).await;
    std::fs::create_dir(service.log_store().partition_path(0)).unwrap();

    let response = reqwest::Client::new()
        .post(format!("{url}/v1/storage?partition=0"))
        .json(&vec![entry("svc", "m")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("storing logs failed"), "{body}");
}

#[tokio::test]
async fn test_wrong_methods_are_405() {
    let dir = tempdir().unwrap();
    let (url, _service) = common::spawn_storage(dir.path()).await;
    let http = reqwest::Client::new();

    let response = http
        .get(format!("{url}/v1/storage?partition=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

    let response = http
        .post(format!("{url}/v1/read?partition=0&limit=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_read_rejects_bad_requests() {
    let dir = tempdir().unwrap();
    let (url, service) = common::spawn_storage(dir.path()).await;
    service.store(0, &[entry("svc", "m")]).unwrap();
    let http = reqwest::Client::new();

    let cases = [
        "partition=-1&limit=1",
        "partition=abc&limit=1",
        "partition=0&limit=-1",
        "partition=0&limit=abc",
        "partition=0",
        // never written
        "partition=3&limit=1",
    ];
    for query in cases {
        let response = http
            .get(format!("{url}/v1/read?{query}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{query}");
    }
}

#[tokio::test]
async fn test_health() {
    let dir = tempdir().unwrap();
    let (url, _service) = common::spawn_storage(dir.path()).await;

    let body: serde_json::Value = reqwest::get(format!("{url}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_client_append_and_read() {
    let dir = tempdir().unwrap();
    let (url, _service) = common::spawn_storage(dir.path()).await;
    let client = StorageClient::new(RoutingTable::new(&url)).unwrap();

    let entries: Vec<_> = (1..=5).map(|i| entry("svc", &format!("m{i}"))).collect();
    client.append(1, &entries).await.unwrap();

    let tail = client.read(1, 2).await.unwrap();
    assert_eq!(tail, entries[3..].to_vec());

    assert!(client.read(1, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_remote_error_carries_status() {
    let node = common::spawn_failing_node(StatusCode::SERVICE_UNAVAILABLE).await;
    let client = StorageClient::new(RoutingTable::new(&node)).unwrap();

    let err = client.append(0, &[entry("svc", "m")]).await.unwrap_err();
    assert!(matches!(err, ClientError::Remote { status: 503, .. }));
    assert_eq!(err.status(), Some(503));

    let err = client.read(0, 5).await.unwrap_err();
    assert!(matches!(
        err,
        ShardlogError::Client(ClientError::Remote { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_client_read_of_unwritten_partition_is_remote_error() {
    let dir = tempdir().unwrap();
    let (url, _service) = common::spawn_storage(dir.path()).await;
    let client = StorageClient::new(RoutingTable::new(&url)).unwrap();

    let err = client.read(3, 10).await.unwrap_err();
    assert!(matches!(
        err,
        ShardlogError::Client(ClientError::Remote { status: 400, .. })
    ));
}

#[tokio::test]
async fn test_client_transport_error() {
    let client = StorageClient::new(RoutingTable::new(common::unreachable_address())).unwrap();

    let err = client.append(0, &[entry("svc", "m")]).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(err.status(), None);

    let err = client.read(0, 1).await.unwrap_err();
    assert!(matches!(
        err,
        ShardlogError::Client(ClientError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_client_negative_limit_makes_no_request() {
    // Any request to this address would be a transport error instead.
    let client = StorageClient::new(RoutingTable::new(common::unreachable_address())).unwrap();

    let err = client.read(0, -4).await.unwrap_err();
    assert!(matches!(
        err,
        ShardlogError::Validation(ValidationError::InvalidLimit { limit: -4 })
    ));
}

#[tokio::test]
async fn test_unmapped_partition_goes_to_default_node() {
    let dir = tempdir().unwrap();
    let (url, service) = common::spawn_storage(dir.path()).await;
    let routing = RoutingTable::new(&url).with_route(0, common::unreachable_address());
    let client = StorageClient::new(routing).unwrap();

    client.append(7, &[entry("svc", "defaulted")]).await.unwrap();

    assert_eq!(service.read(7, 1).unwrap()[0].message(), "defaulted");
}
