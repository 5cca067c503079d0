//! HTTP backend behavior against a mock server.
//!
//! # Invariants
//! - Requests carry the bearer token when one is configured.
//! - 429/502/503/504 are retried with backoff up to `max_retries`.
//! - Other failures surface immediately as `ConfigFetch` with the status.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use secrecy::SecretString;
use url::Url;
use variables_client::{ConfigBackend, HttpBackend, ProviderState, RemoteOptions, RemoteProvider};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer, max_retries: usize) -> HttpBackend {
    let base = Url::parse(&server.uri()).unwrap();
    HttpBackend::new(
        &base,
        Some(SecretString::from("test-token".to_string())),
        Duration::from_secs(5),
        max_retries,
    )
    .unwrap()
    .with_retry_backoff(Duration::from_millis(10))
}

fn served_document() -> serde_json::Value {
    json!({
        "variables": {
            "flag": {
                "variants": {
                    "on": {"key": "on", "serialized_value": "true"},
                    "off": {"key": "off", "serialized_value": "false"}
                },
                "rollout": {"variants": {"on": 0.3, "off": 0.7}},
                "aliases": ["legacy_flag"]
            }
        }
    })
}

#[tokio::test]
async fn test_fetch_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/variables"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(served_document()))
        .expect(1)
        .mount(&server)
        .await;

    let config = backend(&server, 0).fetch().await.unwrap();
    let flag = config.get("flag").unwrap();
    assert_eq!(flag.name(), "flag");
    assert_eq!(flag.variants().len(), 2);
    assert_eq!(flag.aliases(), ["legacy_flag".to_string()]);
}

#[tokio::test]
async fn test_rate_limited_fetch_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/variables"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(served_document()))
        .expect(1)
        .mount(&server)
        .await;

    let config = backend(&server, 3).fetch().await.unwrap();
    assert!(config.get("flag").is_some());
}

#[tokio::test]
async fn test_unavailable_backend_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/variables"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = backend(&server, 2).fetch().await.unwrap_err();
    match err {
        VariablesError::ConfigFetch { message, .. } => {
            assert!(message.contains("giving up after 3 attempt(s)"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/variables"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .expect(1)
        .mount(&server)
        .await;

    let err = backend(&server, 3).fetch().await.unwrap_err();
    assert!(!err.is_retryable());
    match err {
        VariablesError::ConfigFetch { status, message } => {
            assert_eq!(status, Some(401));
            assert!(message.contains("bad token"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_document_is_model_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "variables": {"flag": {"variants": {}, "rollout": {"variants": {"on": 1.0}}}}
        })))
        .mount(&server)
        .await;

    let err = backend(&server, 0).fetch().await.unwrap_err();
    assert!(matches!(err, VariablesError::Model(_)));
}

#[tokio::test]
async fn test_push_puts_document() {
    let server = MockServer::start().await;
    let document = document([flag_config()]);
    let expected = serde_json::to_value(&document).unwrap();
    Mock::given(method("PUT"))
        .and(path("/v1/variables"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(expected))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server, 0).push(&document).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remote_provider_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(served_document()))
        .mount(&server)
        .await;

    let backend = Arc::new(backend(&server, 0));
    let provider = tokio::task::spawn_blocking(move || {
        RemoteProvider::new(
            backend,
            RemoteOptions::default()
                .with_poll_interval(Duration::from_secs(3600))
                .with_block_before_first_resolve(true)
                .with_block_timeout(Duration::from_secs(5)),
        )
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(provider.state(), ProviderState::Ready);
    assert_eq!(
        provider.resolve_alias("legacy_flag").as_deref(),
        Some("flag")
    );
    tokio::task::spawn_blocking(move || provider.close())
        .await
        .unwrap();
}
