//! Failover integration tests
//!
//! Tests the failover chain over real HTTP:
//! 1. Dead primary falls back to a healthy replica
//! 2. Error statuses count as failures
//! 3. A healthy primary is the only replica contacted
//! 4. Exhaustion reports the last location
//! 5. B3 headers reach the backend

use fanrelay::client::{FailoverClient, HttpDispatcher, RequestTemplate};
use fanrelay::config::ClientConfig;
use fanrelay::error::Error;
use fanrelay::resolver::{Location, LocationList, StaticResolver};
use fanrelay::trace::TraceContext;
use std::sync::Arc;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::DEAD_PORT;

fn location_of(server: &MockServer) -> Location {
    Location::new("127.0.0.1", server.address().port())
}

fn client() -> FailoverClient {
    let config = ClientConfig {
        request_timeout_secs: 5,
        connect_timeout_secs: 1,
        ..ClientConfig::default()
    };
    FailoverClient::new(
        Arc::new(HttpDispatcher::new(&config).unwrap()),
        Arc::new(StaticResolver::new()),
    )
}

fn echo_template() -> RequestTemplate {
    RequestTemplate::for_service("brave", "/echo/x").unwrap()
}

async fn mount(server: &MockServer, status: u16, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/brave/echo/x"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

// ============================================================================
// Fallback Tests
// ============================================================================

#[tokio::test]
async fn test_dead_primary_falls_back() {
    let healthy = MockServer::start().await;
    mount(&healthy, 200, "x, x, x", 1).await;

    let locations = vec![Location::new("127.0.0.1", DEAD_PORT), location_of(&healthy)];
    let body = client()
        .request_with_failover(&echo_template(), &locations)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(body, "x, x, x");
}

#[tokio::test]
async fn test_error_statuses_fall_through_to_third() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    let c = MockServer::start().await;
    mount(&a, 500, "boom", 1).await;
    mount(&b, 503, "busy", 1).await;
    mount(&c, 200, "ok", 1).await;

    let locations = vec![location_of(&a), location_of(&b), location_of(&c)];
    let body = client()
        .request_with_failover(&echo_template(), &locations)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_healthy_primary_is_only_contact() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;
    mount(&primary, 200, "first", 1).await;
    mount(&secondary, 200, "second", 0).await;

    let locations = vec![location_of(&primary), location_of(&secondary)];
    let body = client()
        .request_with_failover(&echo_template(), &locations)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(body, "first");
}

#[tokio::test]
async fn test_all_failed_reports_last_location() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    mount(&a, 500, "", 1).await;
    mount(&b, 404, "", 1).await;

    let locations = vec![location_of(&a), location_of(&b)];
    let err = client()
        .request_with_failover(&echo_template(), &locations)
        .unwrap()
        .await
        .unwrap_err();

    match err {
        Error::AllEndpointsExhausted {
            attempts, last, source,
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(last, location_of(&b));
            assert!(source.to_string().contains("404"), "{source}");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolved_service_chain() {
    let healthy = MockServer::start().await;
    mount(&healthy, 200, "resolved", 1).await;

    let resolver = StaticResolver::new().with_service(
        "brave",
        LocationList::new(vec![Location::new("127.0.0.1", DEAD_PORT), location_of(&healthy)])
            .unwrap(),
    );
    let client = FailoverClient::new(
        Arc::new(HttpDispatcher::new(&ClientConfig::default()).unwrap()),
        Arc::new(resolver),
    );

    let body = client
        .request_service(&echo_template(), "brave")
        .unwrap()
        .await
        .unwrap();
    assert_eq!(body, "resolved");
}

// ============================================================================
// Trace Propagation Tests
// ============================================================================

#[tokio::test]
async fn test_b3_headers_carry_current_trace() {
    let backend = MockServer::start().await;
    let context = TraceContext::new_root();

    Mock::given(method("GET"))
        .and(path("/brave/echo/x"))
        .and(header("x-b3-traceid", context.trace_id_hex().as_str()))
        .and(header("x-b3-parentspanid", context.span_id_hex().as_str()))
        .and(header_exists("x-b3-spanid"))
        .and(header("x-b3-sampled", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("traced"))
        .expect(1)
        .mount(&backend)
        .await;

    let locations = vec![location_of(&backend)];
    let pending = context.sync_scope(|| {
        client()
            .request_with_failover(&echo_template(), &locations)
            .unwrap()
    });

    assert_eq!(pending.await.unwrap(), "traced");
}
