mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedTransport, ok, status};
use filing_ingestor::client::{ClientError, RateLimitedClient, Request, Response, RetryPolicy};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        throttle_base: Duration::from_millis(1),
        throttle_cap: Duration::from_millis(4),
        transient_delay: Duration::from_millis(1),
    }
}

fn client(
    responses: Vec<Response>,
) -> (Arc<ScriptedTransport>, RateLimitedClient<Arc<ScriptedTransport>>) {
    let transport = Arc::new(ScriptedTransport::new(responses));
    let client = RateLimitedClient::with_min_interval(
        Arc::clone(&transport),
        Duration::from_millis(1),
        fast_policy(),
    );
    (transport, client)
}

#[tokio::test]
async fn success_passes_through_on_first_attempt() {
    let (transport, client) = client(vec![ok("hello")]);

    let response = client.execute(&Request::get("http://example/a")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn throttled_requests_are_retried_until_success() {
    let (transport, client) = client(vec![
        status(429, "slow down"),
        status(403, "Request Rate Threshold Exceeded"),
        ok("finally"),
    ]);

    let response = client.execute(&Request::get("http://example/a")).await.unwrap();
    assert_eq!(response.body, "finally");
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn not_found_is_a_normal_result_never_retried() {
    let (transport, client) = client(vec![status(404, "")]);

    let response = client
        .execute(&Request::get("http://example/missing"))
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_status() {
    let (transport, client) = client(vec![
        status(500, "boom"),
        status(502, "boom"),
        status(503, "boom"),
        status(500, "boom"),
    ]);

    let err = client
        .execute(&Request::get("http://example/broken"))
        .await
        .unwrap_err();
    match err {
        ClientError::RequestFailed { status, attempts } => {
            assert_eq!(status, 500);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 4);
}
