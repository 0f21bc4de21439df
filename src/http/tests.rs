//! Tests for the HTTP client module

use super::*;
use crate::error::Error;
use futures::TryStreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn test_config(server: &MockServer) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(2)
        .backoff(Duration::from_millis(10), Duration::from_millis(50))
        .jitter(Duration::ZERO)
        .build()
}

async fn collect_body(stream: ByteStream) -> Vec<u8> {
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
    chunks.concat()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.retry.max_retries, 2);
    assert!(config.base_url.is_none());
    assert_eq!(
        config.path_for(Resource::Profiles),
        "structured_generated_data.json"
    );
    assert_eq!(
        config.path_for(Resource::Summaries),
        "large_generated_data.json"
    );
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://provider.example.com")
        .timeout(Duration::from_secs(60))
        .max_retries(5)
        .backoff(Duration::from_millis(200), Duration::from_secs(30))
        .resource_path(Resource::Profiles, "v2/profiles.json")
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(
        config.base_url,
        Some("https://provider.example.com".to_string())
    );
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.retry.max_retry_after, Duration::from_secs(60));
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.initial_backoff, Duration::from_millis(200));
    assert_eq!(config.retry.max_backoff, Duration::from_secs(30));
    assert_eq!(config.path_for(Resource::Profiles), "v2/profiles.json");
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[tokio::test]
async fn test_fetch_stream_returns_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/structured_generated_data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":1}]"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(test_config(&mock_server)).unwrap();
    let stream = client.fetch_stream(Resource::Profiles).await.unwrap();
    let counter = stream.counter();

    assert_eq!(stream.resource(), Resource::Profiles);
    let body = collect_body(stream).await;
    assert_eq!(body, br#"[{"id":1}]"#);
    assert_eq!(counter.get(), 10);
}

#[tokio::test]
async fn test_fetch_sends_trace_id_and_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/large_generated_data.json"))
        .and(header_exists(TRACE_ID_HEADER))
        .and(header("user-agent", "harvester-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .user_agent("harvester-test")
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let stream = client.fetch_stream(Resource::Summaries).await.unwrap();

    assert!(uuid::Uuid::parse_str(stream.trace_id()).is_ok());
}

#[tokio::test]
async fn test_retry_until_success_yields_same_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/structured_generated_data.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/structured_generated_data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":7}]"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(test_config(&mock_server)).unwrap();
    let stream = client.fetch_stream(Resource::Profiles).await.unwrap();

    assert_eq!(collect_body(stream).await, br#"[{"id":7}]"#);
}

#[tokio::test]
async fn test_each_attempt_gets_fresh_trace_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(test_config(&mock_server)).unwrap();
    let result = client.fetch_stream(Resource::Profiles).await;
    assert!(result.is_err());

    let requests: Vec<Request> = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    let trace_ids: HashSet<String> = requests
        .iter()
        .filter_map(|r| r.headers.get(TRACE_ID_HEADER))
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(trace_ids.len(), 3);
}

#[tokio::test]
async fn test_retries_exhausted_reports_last_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(test_config(&mock_server)).unwrap();
    let err = client.fetch_stream(Resource::Summaries).await.unwrap_err();

    match err {
        Error::RemoteFetch {
            resource,
            attempts,
            status,
            message,
        } => {
            assert_eq!(resource, "summaries");
            assert_eq!(attempts, 3);
            assert_eq!(status, Some(500));
            assert!(message.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_retryable_status_fails_immediately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(test_config(&mock_server)).unwrap();
    let err = client.fetch_stream(Resource::Profiles).await.unwrap_err();

    assert!(matches!(
        err,
        Error::RemoteFetch {
            attempts: 1,
            status: Some(404),
            ..
        }
    ));
}

#[tokio::test]
async fn test_rate_limited_honours_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .max_retries(1)
        // a computed backoff this long would stall the test
        .backoff(Duration::from_secs(600), Duration::from_secs(600))
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let started = std::time::Instant::now();
    let stream = client.fetch_stream(Resource::Profiles).await.unwrap();
    assert_eq!(collect_body(stream).await, b"[]");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_connection_refused_is_retried_then_fails() {
    // Bind and drop a listener to get a port with nothing behind it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = HttpClientConfig::builder()
        .base_url(format!("http://{addr}"))
        .max_retries(2)
        .backoff(Duration::from_millis(5), Duration::from_millis(10))
        .jitter(Duration::ZERO)
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let err = client.fetch_stream(Resource::Profiles).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RemoteFetch {
            attempts: 3,
            status: None,
            ..
        }
    ));
}

/// Accepts connections, dropping the first `drops` of them once the request
/// has been read, then answers with an empty array
async fn spawn_dropping_server(drops: usize) -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let seen = counter.fetch_add(1, Ordering::SeqCst);

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            if seen < drops {
                drop(socket);
                continue;
            }
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]")
                .await;
        }
    });

    (format!("http://{addr}"), accepted)
}

#[tokio::test]
async fn test_dropped_connection_is_retried() {
    let (base_url, accepted) = spawn_dropping_server(2).await;

    let config = HttpClientConfig::builder()
        .base_url(base_url)
        .max_retries(2)
        .backoff(Duration::from_millis(5), Duration::from_millis(10))
        .jitter(Duration::ZERO)
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let stream = client.fetch_stream(Resource::Profiles).await.unwrap();
    assert_eq!(collect_body(stream).await, b"[]");
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_dropped_connection_exhausts_retries() {
    let (base_url, accepted) = spawn_dropping_server(usize::MAX).await;

    let config = HttpClientConfig::builder()
        .base_url(base_url)
        .max_retries(1)
        .backoff(Duration::from_millis(5), Duration::from_millis(10))
        .jitter(Duration::ZERO)
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let err = client.fetch_stream(Resource::Profiles).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RemoteFetch {
            attempts: 2,
            status: None,
            ..
        }
    ));
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fetch_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/large_generated_data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "a1"}, {"id": "a2"}
        ])))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(test_config(&mock_server)).unwrap();
    let data: Vec<serde_json::Value> = client.fetch_json(Resource::Summaries).await.unwrap();

    assert_eq!(data.len(), 2);
    assert_eq!(data[1]["id"], "a2");
}

#[tokio::test]
async fn test_full_url_resource_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/elsewhere/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .resource_path(
            Resource::Profiles,
            format!("{}/elsewhere/data.json", mock_server.uri()),
        )
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let stream = client.fetch_stream(Resource::Profiles).await.unwrap();
    assert_eq!(collect_body(stream).await, b"[]");
}

#[test]
fn test_resource_parse_and_display() {
    assert_eq!("profiles".parse::<Resource>().unwrap(), Resource::Profiles);
    assert_eq!("summaries".parse::<Resource>().unwrap(), Resource::Summaries);
    assert!("other".parse::<Resource>().is_err());
    assert_eq!(Resource::Summaries.to_string(), "summaries");
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::with_config(HttpClientConfig::default()).unwrap();
    let debug_str = format!("{client:?}");
    assert!(debug_str.contains("HttpClient"));
    assert!(debug_str.contains("config"));
}
