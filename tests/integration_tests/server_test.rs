//! End-to-end relay server tests
//!
//! Runs the real server on an ephemeral port with the production
//! orchestrator and drives it over HTTP.

use fanrelay::config::Config;
use fanrelay::resolver::Location;
use fanrelay::server::RelayServer;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::DEAD_PORT;

/// Running server plus what is needed to stop it
struct Running {
    base_url: String,
    server: Arc<RelayServer>,
    stop: Option<oneshot::Sender<()>>,
}

impl Running {
    /// Start a server whose "brave" service is `[dead, extra..]`, with the
    /// server itself appended when `include_self` is set
    async fn start(extra: Vec<Location>, include_self: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut brave = vec![Location::new("127.0.0.1", DEAD_PORT)];
        brave.extend(extra);
        if include_self {
            brave.push(Location::new("127.0.0.1", port));
        }

        let mut config = Config::default();
        config.services.insert("brave".to_string(), brave);
        config.handler.long_delay_secs = 0;
        config.client.request_timeout_secs = 5;
        config.client.connect_timeout_secs = 1;
        config.server.enable_request_logging = false;

        let server = Arc::new(RelayServer::new(config).unwrap());
        let (stop, stopped) = oneshot::channel::<()>();
        let serving = server.clone();
        tokio::spawn(async move {
            serving
                .serve(listener, async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            server,
            stop: Some(stop),
        }
    }

    async fn get(&self, route: &str) -> reqwest::Response {
        reqwest::get(format!("{}{route}", self.base_url)).await.unwrap()
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.server.shutdown();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fanout_through_itself_with_dead_primary() {
    let running = Running::start(Vec::new(), true).await;

    let response = running.get("/brave/call/3").await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "0, 0, 0\n1, 1, 1\n2, 2, 2\nYour request was delayed by 0 seconds"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_default_fanout_count() {
    let running = Running::start(Vec::new(), true).await;

    let body = running.get("/brave/call").await.text().await.unwrap();
    assert_eq!(body.lines().count(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_replicas_down_is_bad_gateway() {
    let running = Running::start(Vec::new(), false).await;

    let response = running.get("/brave/call/1").await;
    assert_eq!(response.status(), 502);
    let body = response.text().await.unwrap();
    assert!(
        body.contains("Fan-out member at index 0 failed (2 members)"),
        "{body}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delay_and_echo_routes() {
    let running = Running::start(Vec::new(), true).await;

    let echo = running.get("/brave/echo/hello").await;
    assert_eq!(echo.text().await.unwrap(), "hello, hello, hello");

    let delay = running.get("/brave/delay/0").await;
    assert_eq!(delay.status(), 200);
    assert_eq!(
        delay.text().await.unwrap(),
        "Your request was delayed by 0 seconds"
    );

    let negative = running.get("/brave/delay/-4").await;
    assert_eq!(negative.status(), 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_incoming_trace_reaches_backend() {
    let backend = MockServer::start().await;
    let trace_id = "463ac35c9f6413ad48485a3953bb6124";

    Mock::given(method("GET"))
        .and(path("/brave/delay/0"))
        .and(header("x-b3-traceid", trace_id))
        .respond_with(ResponseTemplate::new(200).set_body_string("delayed"))
        .expect(1)
        .mount(&backend)
        .await;

    let running = Running::start(
        vec![Location::new("127.0.0.1", backend.address().port())],
        false,
    )
    .await;

    let response = reqwest::Client::new()
        .get(format!("{}/brave/call/0", running.base_url))
        .header("X-B3-TraceId", trace_id)
        .header("X-B3-SpanId", "a2fb4a1d1a96d312")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-b3-traceid"], trace_id);
    assert_eq!(response.text().await.unwrap(), "delayed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_endpoint() {
    let running = Running::start(Vec::new(), false).await;

    let json: serde_json::Value = running.get("/health").await.json().await.unwrap();
    assert_eq!(json["status"], "healthy");
    assert!(json["uptime_secs"].is_u64());
}
