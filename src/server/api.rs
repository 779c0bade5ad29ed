//! HTTP routes of the relay
//!
//! All routes answer `GET` with a plain-text body, except `/health` (JSON)
//! and `/metrics` (Prometheus text format).

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{Error, RelayErrorTrait, Result};
use crate::metrics;

use super::middleware::trace_context;
use super::AppState;
use super::suspension::Suspension;

/// Fan-out count used by `/brave/call` without a count
pub const DEFAULT_FANOUT: i64 = 3;

// ============================================================================
// API Response Types
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let category = self.category().as_str();
        if status.is_server_error() {
            tracing::warn!(
                status = status.as_u16(),
                category,
                recoverable = self.is_recoverable(),
                root_cause = %self.root_cause(),
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(status = status.as_u16(), category, error = %self, "Request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

/// HTTP status for an error
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::EndpointUnavailable { .. }
        | Error::AllEndpointsExhausted { .. }
        | Error::AggregateMemberFailed { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/brave/echo/{text}", get(echo))
        .route("/brave/delay/{age}", get(delay))
        .route("/brave/call", get(call_default))
        .route("/brave/call/{how_many}", get(call))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(trace_context))
        .with_state(state)
}

// ============================================================================
// Relay Handlers
// ============================================================================

async fn echo(State(state): State<AppState>, Path(text): Path<String>) -> String {
    state.orchestrator.echo(&text)
}

async fn delay(State(state): State<AppState>, Path(age): Path<String>) -> Result<String> {
    let seconds = parse_integer("age", &age)?;
    let suspension = suspend(&state);
    suspension.resume(state.orchestrator.delay(seconds)?).await
}

async fn call(State(state): State<AppState>, Path(how_many): Path<String>) -> Result<String> {
    let count = parse_integer("how_many", &how_many)?;
    fan_out(&state, count).await
}

async fn call_default(State(state): State<AppState>) -> Result<String> {
    fan_out(&state, DEFAULT_FANOUT).await
}

async fn fan_out(state: &AppState, count: i64) -> Result<String> {
    let suspension = suspend(state);
    suspension.resume(state.orchestrator.fanout(count)?).await
}

/// Open a suspension and ask for the handler's longer timeout before any
/// async work starts
pub(super) fn suspend(state: &AppState) -> Suspension {
    let mut suspension = Suspension::from_config(&state.config);
    let requested = state.orchestrator.suspend_timeout();
    if !suspension.set_timeout(requested) {
        let refusal = Error::SuspensionTimeoutMisconfigured { requested };
        tracing::warn!(
            error = %refusal,
            timeout = ?suspension.timeout(),
            "Continuing with the default suspension timeout"
        );
    }
    suspension
}

fn parse_integer(name: &str, raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::invalid_argument(format!("{name} must be an integer, got '{raw}'")))
}

// ============================================================================
// Health & Metrics Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Prometheus metrics endpoint
async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {e}"),
        )
            .into_response(),
    }
}
