//! Cached HTTP client behaviour against a live mock server

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use species_image_seeder::http::{
    build_http_client, BackoffPolicy, CachedHttpClient, CachedResponse, RateLimiter, ResponseCache,
};
use species_image_seeder::HttpError;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(cache_dir: &Path) -> CachedHttpClient {
    let http = build_http_client("TestSeeder/1.0", Duration::from_secs(5)).unwrap();
    CachedHttpClient::new(
        http,
        ResponseCache::new(cache_dir, 24, true),
        RateLimiter::new(Duration::from_millis(1)),
        BackoffPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        },
    )
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn test_stale_cache_entry_triggers_live_request() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/occurrence/search", server.uri());

    Mock::given(method("GET"))
        .and(path("/occurrence/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "live" })))
        .mount(&server)
        .await;

    let client = client(dir.path());

    // Written 25 hours ago with a 24 hour TTL
    let stale = CachedResponse {
        url: url.clone(),
        stored_at: Utc::now() - ChronoDuration::hours(25),
        body: json!({ "version": "stale" }).to_string(),
    };
    client.cache().write_entry(&stale).await.unwrap();

    let value: Value = client.get(&url, "gbif").await.unwrap();
    assert_eq!(value["version"], "live");
    assert_eq!(request_count(&server).await, 1);

    // The live response replaced the stale entry, so this is a hit
    let value: Value = client.get(&url, "gbif").await.unwrap();
    assert_eq!(value["version"], "live");
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_fresh_cache_entry_skips_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/taxa/autocomplete", server.uri());

    let cached = client(dir.path());
    let fresh = CachedResponse {
        url: url.clone(),
        stored_at: Utc::now() - ChronoDuration::hours(23),
        body: json!({ "results": [] }).to_string(),
    };
    cached.cache().write_entry(&fresh).await.unwrap();

    let value: Value = cached.get(&url, "inaturalist").await.unwrap();
    assert_eq!(value["results"], json!([]));
    assert_eq!(request_count(&server).await, 0);

    // Refresh mode reads past the cache
    let refreshing = client(dir.path()).with_refresh(true);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [1] })))
        .mount(&server)
        .await;
    let value: Value = refreshing.get(&url, "inaturalist").await.unwrap();
    assert_eq!(value["results"], json!([1]));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let client = client(dir.path());
    let value: Value = client
        .get(&format!("{}/flaky", server.uri()), "commons")
        .await
        .unwrap();

    assert_eq!(value["ok"], true);
    assert_eq!(request_count(&server).await, 3);
    assert_eq!(client.failure_count(), 0);
}

#[tokio::test]
async fn test_exhausted_retries_surface_last_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client(dir.path());
    let err = client
        .get::<Value>(&format!("{}/down", server.uri()), "gbif")
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Status { status: 500, .. }));
    assert_eq!(request_count(&server).await, 3);
    assert_eq!(client.failure_count(), 1);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(dir.path());
    let err = client
        .get::<Value>(&format!("{}/missing", server.uri()), "gbif")
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Status { status: 404, .. }));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_malformed_body_is_retried_and_never_cached() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/garbled", server.uri());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&server)
        .await;

    let client = client(dir.path());
    let err = client.get::<Value>(&url, "commons").await.unwrap_err();

    assert!(matches!(err, HttpError::Decode { .. }));
    assert_eq!(request_count(&server).await, 3);
    assert!(!client.cache().entry_path(&url).exists());
}

#[tokio::test]
async fn test_download_binary_writes_destination() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let bytes = vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3];

    Mock::given(method("GET"))
        .and(path("/photo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.clone()))
        .mount(&server)
        .await;

    let client = client(dir.path());
    let destination = dir.path().join("images").join("vipera_berus").join("0.png");
    client
        .download_binary(&format!("{}/photo.png", server.uri()), &destination, "commons")
        .await
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), bytes);
    let leftovers: Vec<_> = std::fs::read_dir(destination.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_failed_download_leaves_no_temp_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .mount(&server)
        .await;

    // A directory already sits at the destination, so the final rename fails
    let species_dir = dir.path().join("images").join("vipera_berus");
    let destination = species_dir.join("adder.jpg");
    std::fs::create_dir_all(destination.join("occupied")).unwrap();

    let client = client(dir.path());
    let err = client
        .download_binary(&format!("{}/photo.jpg", server.uri()), &destination, "gbif")
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Io { .. }));
    assert_eq!(request_count(&server).await, 1);
    let leftovers: Vec<_> = std::fs::read_dir(&species_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
