use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

use tutor_core::settings::{BreakerSettings, ExternalSettings, Settings};
use tutor_core::traits::KnowledgeSource;
use tutor_external::{BreakerError, BreakerState, ExternalError, ExternalKnowledgeClient, ExternalServices};

const AGENT: &str = "StudyTutor/1.0 (https://example.org/tutor; dev@example.org)";

fn settings(server: &MockServer) -> Settings {
    Settings {
        external: ExternalSettings {
            api_endpoint: server.url("/w/api.php"),
            user_agent: AGENT.to_string(),
            rate_limit_per_sec: 1000.0,
            max_backoff_secs: 0.01,
            http_timeout_secs: 2.0,
            request_timeout_secs: 5.0,
            ..ExternalSettings::default()
        },
        breaker: BreakerSettings { failure_threshold: 2, open_timeout_secs: 60.0, success_threshold: 1 },
        ..Settings::default()
    }
}

fn client(settings: &Settings) -> ExternalKnowledgeClient {
    ExternalKnowledgeClient::new(&settings.external, ExternalServices::from_settings(settings)).unwrap()
}

fn photosynthesis_page() -> serde_json::Value {
    json!({
        "batchcomplete": true,
        "query": { "pages": [ {
            "pageid": 24544,
            "title": "Photosynthesis",
            "extract": "Photosynthesis is a biological process used by many cellular organisms to convert light energy into chemical energy. It takes place in chloroplasts.",
            "revisions": [ { "revid": 1187654321 } ]
        } ] }
    })
}

#[tokio::test]
async fn lookup_fetches_then_serves_from_cache() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/w/api.php")
                .query_param("action", "query")
                .query_param("titles", "Photosynthesis")
                .query_param("format", "json")
                .query_param("formatversion", "2")
                .header("user-agent", AGENT);
            then.status(200).json_body(photosynthesis_page());
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    let record = client.lookup("Photosynthesis").await.expect("record");
    assert_eq!(record.title, "Photosynthesis");
    assert_eq!(record.rev_id, Some(1187654321));
    assert!(record.attribution().contains("Licensed under CC BY-SA 3.0"));

    // Different casing and whitespace map to the same cache key
    let again = client.lookup("  photosynthesis ").await;
    assert_eq!(again.map(|r| r.title).as_deref(), Some("Photosynthesis"));
    mock.assert_hits_async(1).await;
    let stats = client.services().cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn lag_signal_is_retried_then_counted_as_failure() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(503).header("Retry-After", "0");
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(client.lookup("Photosynthesis").await.is_none());
    mock.assert_hits_async(3).await;
    assert_eq!(client.services().breaker.status().failure_count, 1);
}

#[tokio::test]
async fn maxlag_error_body_is_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(200)
                .header("Retry-After", "0")
                .json_body(json!({ "error": { "code": "maxlag", "info": "Waiting for a database server" } }));
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(matches!(client.fetch("DNA").await, Err(BreakerError::Inner(ExternalError::RetriesExhausted(3)))));
    mock.assert_hits_async(3).await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(400);
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(client.lookup("DNA").await.is_none());
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn server_errors_back_off_and_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(502);
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(matches!(client.fetch("DNA").await, Err(BreakerError::Inner(ExternalError::Status(502)))));
    mock.assert_hits_async(3).await;
}

#[tokio::test]
async fn open_circuit_stops_calling_the_api() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(404);
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(client.lookup("one").await.is_none());
    assert!(client.lookup("two").await.is_none());
    assert_eq!(client.services().breaker.state(), BreakerState::Open);
    assert!(client.fetch("three").await.unwrap_err().is_open());
    mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn unusable_answer_is_not_a_breaker_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(200).json_body(json!({
                "query": { "pages": [ { "title": "Stub", "pageid": 1, "extract": "Short stub." } ] }
            }));
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(client.lookup("Stub").await.is_none());
    assert_eq!(client.services().breaker.status().failure_count, 0);
    assert!(client.services().cache.is_empty());
}

#[tokio::test]
async fn slow_api_times_out_as_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(200).delay(Duration::from_millis(800)).json_body(photosynthesis_page());
        })
        .await;

    let mut settings = settings(&server);
    settings.external.request_timeout_secs = 0.1;
    let client = client(&settings);
    assert!(matches!(client.fetch("Photosynthesis").await, Err(BreakerError::Inner(ExternalError::Timeout(_)))));
    assert_eq!(client.services().breaker.status().failure_count, 1);
}

#[tokio::test]
async fn cache_entries_follow_the_raw_query() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php").query_param("titles", "Photosynthesis");
            then.status(200).json_body(photosynthesis_page());
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(client.lookup("Photosynthesis").await.is_some());
    assert!(client.lookup("  PHOTOSYNTHESIS ").await.is_some());
    assert!(client.lookup("<Photosynthesis>").await.is_some());
    assert!(client.lookup(" photosynthesis").await.is_some());

    // "<Photosynthesis>" sanitizes to the same title but is its own entry;
    // case and surrounding whitespace are folded into one.
    mock.assert_hits_async(2).await;
    assert_eq!(client.services().cache.len(), 2);
}

#[tokio::test]
async fn rate_limit_wait_counts_against_request_timeout() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(200).json_body(photosynthesis_page());
        })
        .await;

    let mut settings = settings(&server);
    // Half a token in the bucket: the first call has to wait a full second.
    settings.external.rate_limit_per_sec = 0.5;
    settings.external.request_timeout_secs = 0.1;
    let client = client(&settings);
    assert_eq!(client.services().limiter.rate(), 0.5);

    let start = std::time::Instant::now();
    let result = client.fetch("Photosynthesis").await;
    assert!(matches!(result, Err(BreakerError::Inner(ExternalError::Timeout(_)))), "{result:?}");
    assert!(start.elapsed() < Duration::from_millis(900), "waited {:?}", start.elapsed());
    assert_eq!(client.services().breaker.status().failure_count, 1);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn markup_only_query_never_reaches_the_api() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/w/api.php");
            then.status(200).json_body(photosynthesis_page());
        })
        .await;

    let settings = settings(&server);
    let client = client(&settings);
    assert!(client.lookup("[[ ]] {{ }} <>").await.is_none());
    mock.assert_hits_async(0).await;
}

#[test]
fn construction_requires_policy_compliant_agent() {
    let settings = Settings::default();
    let result = ExternalKnowledgeClient::new(&settings.external, ExternalServices::from_settings(&settings));
    assert!(matches!(result, Err(ExternalError::InvalidUserAgent(_))));
}
