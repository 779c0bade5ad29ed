//! B3 trace context middleware
//!
//! Every routed request runs inside the trace context carried by its
//! `X-B3-*` headers, or a fresh root context when there are none. The
//! response echoes the trace id.

use axum::extract::{MatchedPath, Request};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::metrics;
use crate::trace::{b3, TraceContext};

/// Attach the request's trace context to the handler
pub async fn trace_context(request: Request, next: Next) -> Response {
    let context = b3::extract(request.headers()).unwrap_or_else(TraceContext::new_root);
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span = tracing::info_span!(
        "relay_request",
        trace_id = %context.trace_id_hex(),
        route = %route
    );

    let mut response = context.scope(next.run(request)).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&context.trace_id_hex()) {
        response.headers_mut().insert(b3::TRACE_ID, value);
    }
    metrics::record_api_request(&route, response.status().as_u16());

    response
}
