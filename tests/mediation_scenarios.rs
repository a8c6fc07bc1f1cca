//! End-to-end mediation scenarios over real HTTP.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

mod common;

use common::{SCENARIO_D_PAYLOAD, VALID_REQUEST};

async fn post(client: &reqwest::Client, url: &str, body: &'static str) -> reqwest::Response {
    client
        .post(url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .expect("gateway unreachable")
}

fn header<'a>(res: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    res.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_capacity_exhaustion_returns_429() {
    let backend = common::start_mock_backend(SCENARIO_D_PAYLOAD).await;
    let mut config = common::test_config(backend);
    config.rate_limit.capacity = 3;
    let gateway = common::spawn_gateway(config).await;
    let client = common::client();
    let url = gateway.url("/recommendations");

    for expected_remaining in ["2", "1", "0"] {
        let res = post(&client, &url, VALID_REQUEST).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, "x-ratelimit-limit"), Some("3"));
        assert_eq!(header(&res, "x-ratelimit-remaining"), Some(expected_remaining));
    }

    let res = post(&client, &url, VALID_REQUEST).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&res, "x-ratelimit-remaining"), Some("0"));
    assert_eq!(header(&res, "content-type"), Some("application/problem+json"));
    let reset: u64 = header(&res, "x-ratelimit-reset").unwrap().parse().unwrap();
    assert!(reset >= 1);
    assert_eq!(header(&res, "retry-after"), Some(reset.to_string().as_str()));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "TES-003");
    assert_eq!(body["status"], 429);
    assert_eq!(body["type"], "https://tes.dev/errors/tes-003");
    assert_eq!(body["instance"], "/recommendations");
    assert!(body["correlationId"].as_str().is_some_and(|id| id.len() == 36));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_refused_backend_returns_503_with_retry_after() {
    let backend = common::refused_addr().await;
    let gateway = common::spawn_gateway(common::test_config(backend)).await;
    let client = common::client();

    let res = post(&client, &gateway.url("/recommendations"), VALID_REQUEST).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(header(&res, "retry-after"), Some("10"));
    assert!(header(&res, "x-ratelimit-remaining").is_some());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "TES-002");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_silent_backend_returns_504() {
    let backend = common::start_silent_backend().await;
    let mut config = common::test_config(backend);
    config.backend.call_timeout_ms = 300;
    config.backend.connect_timeout_ms = 100;
    let gateway = common::spawn_gateway(config).await;
    let client = common::client();

    let started = std::time::Instant::now();
    let res = post(&client, &gateway.url("/recommendations"), VALID_REQUEST).await;
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(header(&res, "retry-after").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "TES-004");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_healthy_backend_payload_is_passed_through() {
    let backend = common::start_mock_backend(SCENARIO_D_PAYLOAD).await;
    let gateway = common::spawn_gateway(common::test_config(backend)).await;
    let client = common::client();

    let res = post(&client, &gateway.url("/recommendations"), VALID_REQUEST).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), Some("application/json"));
    assert_eq!(res.text().await.unwrap(), SCENARIO_D_PAYLOAD);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_failing_backend_trips_the_breaker() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (500, r#"{"error":"boom"}"#.to_string())
        }
    })
    .await;

    let mut config = common::test_config(backend);
    config.circuit_breaker.minimum_calls = 2;
    let gateway = common::spawn_gateway(config).await;
    let client = common::client();
    let url = gateway.url("/recommendations");

    for _ in 0..2 {
        let res = post(&client, &url, VALID_REQUEST).await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["code"], "TES-000");
        assert_eq!(body["detail"], "Internal error");
    }

    let res = post(&client, &url, VALID_REQUEST).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(header(&res, "retry-after"), Some("10"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let health: Value = client
        .get(gateway.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["circuit"], "open");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_request_does_not_consume_a_token() {
    let backend = common::start_mock_backend(SCENARIO_D_PAYLOAD).await;
    let mut config = common::test_config(backend);
    config.rate_limit.capacity = 1;
    let gateway = common::spawn_gateway(config).await;
    let client = common::client();
    let url = gateway.url("/recommendations");

    let res = post(&client, &url, r#"{"showId":"","targetSeason":6,"immersion":3}"#).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header(&res, "content-type"), Some("application/problem+json"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "TES-001");
    assert_eq!(body["type"], "https://tes.dev/errors/tes-001");

    let res = post(&client, &url, "not json").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = post(&client, &url, VALID_REQUEST).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "x-ratelimit-remaining"), Some("0"));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_forwarded_clients_get_separate_buckets() {
    let backend = common::start_mock_backend(SCENARIO_D_PAYLOAD).await;
    let mut config = common::test_config(backend);
    config.rate_limit.capacity = 1;
    let gateway = common::spawn_gateway(config).await;
    let client = common::client();
    let url = gateway.url("/recommendations");

    let send_as = |who: &'static str| {
        client
            .post(&url)
            .header("content-type", "application/json")
            .header("x-forwarded-for", who)
            .body(VALID_REQUEST)
            .send()
    };

    assert_eq!(send_as("203.0.113.1").await.unwrap().status(), StatusCode::OK);
    assert_eq!(send_as("203.0.113.2, 10.0.0.1").await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        send_as("203.0.113.1").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let health: Value = client
        .get(gateway.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["trackedClients"], 2);
    assert_eq!(health["inFlight"], 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_is_generated_or_propagated() {
    let backend = common::start_mock_backend(SCENARIO_D_PAYLOAD).await;
    let gateway = common::spawn_gateway(common::test_config(backend)).await;
    let client = common::client();

    let res = client.get(gateway.url("/health")).send().await.unwrap();
    let generated = header(&res, "x-request-id").expect("request id generated");
    assert_eq!(generated.len(), 36);

    let res = client
        .get(gateway.url("/health"))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();
    assert_eq!(header(&res, "x-request-id"), Some("trace-me-123"));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_the_server() {
    let backend = common::start_mock_backend(SCENARIO_D_PAYLOAD).await;
    let gateway = common::spawn_gateway(common::test_config(backend)).await;

    gateway.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), gateway.handle)
        .await
        .expect("server should stop promptly")
        .expect("server task should not panic");
    assert!(result.is_ok());
}
