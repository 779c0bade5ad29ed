//! Transport seam: one non-blocking request against one location
//!
//! The failover client only sees the [`Dispatcher`] trait, so chains can be
//! exercised against a scripted dispatcher in tests. [`HttpDispatcher`] is
//! the production implementation over a shared reqwest client.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::config::ClientConfig;
use crate::error::{Error, RelayErrorTrait, Result};
use crate::metrics;
use crate::trace::{b3, TraceContext};

use super::template::ResolvedRequest;

/// Issues a single request. Every outcome, including network failure, is
/// reported through the returned `Result`.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    async fn dispatch(&self, request: ResolvedRequest) -> Result<String>;
}

/// reqwest-backed dispatcher with bounded concurrency
pub struct HttpDispatcher {
    client: Client,
    permits: Arc<Semaphore>,
}

impl HttpDispatcher {
    /// Create a dispatcher from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(config.max_concurrent_requests)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
        })
    }

    /// Number of dispatches that may start right now
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, request: ResolvedRequest) -> Result<String> {
        let ResolvedRequest {
            method,
            url,
            location,
        } = request;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::endpoint_unavailable(&location, "dispatcher is closed"))?;

        // outbound calls are child spans of the request being served
        let span_ctx = TraceContext::current()
            .unwrap_or_else(TraceContext::new_root)
            .child();
        let mut headers = HeaderMap::new();
        b3::inject(&span_ctx, &mut headers);

        tracing::debug!(
            method = %method,
            url = %url,
            span_id = %span_ctx.span_id_hex(),
            "Dispatching request"
        );

        let started = Instant::now();
        let outcome = async {
            let response = self
                .client
                .request(method, url)
                .headers(headers)
                .send()
                .await
                .map_err(|e| Error::endpoint_unavailable(&location, describe(&e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::endpoint_unavailable(
                    &location,
                    format!("HTTP {status}"),
                ));
            }

            response
                .text()
                .await
                .map_err(|e| Error::endpoint_unavailable(&location, describe(&e)))
        }
        .await;

        // failures are labelled by category, e.g. "network"
        let label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.category().as_str(),
        };
        metrics::record_dispatch(label, started.elapsed());
        tracing::debug!(
            location = %location,
            outcome = label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatch finished"
        );

        outcome
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else if err.is_decode() || err.is_body() {
        format!("could not read response body: {err}")
    } else {
        err.to_string()
    }
}
