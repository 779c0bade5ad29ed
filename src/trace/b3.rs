//! B3 header propagation
//!
//! Reads and writes the multi-header B3 format (`X-B3-TraceId`,
//! `X-B3-SpanId`, `X-B3-ParentSpanId`, `X-B3-Sampled`) so trace context
//! survives the hop to a backend replica.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::TraceContext;

pub const TRACE_ID: HeaderName = HeaderName::from_static("x-b3-traceid");
pub const SPAN_ID: HeaderName = HeaderName::from_static("x-b3-spanid");
pub const PARENT_SPAN_ID: HeaderName = HeaderName::from_static("x-b3-parentspanid");
pub const SAMPLED: HeaderName = HeaderName::from_static("x-b3-sampled");

/// Write `ctx` into `headers`, replacing any existing B3 values
pub fn inject(ctx: &TraceContext, headers: &mut HeaderMap) {
    insert(headers, TRACE_ID, &ctx.trace_id_hex());
    insert(headers, SPAN_ID, &ctx.span_id_hex());
    match ctx.parent_span_id() {
        Some(parent) => insert(headers, PARENT_SPAN_ID, &format!("{parent:016x}")),
        None => {
            headers.remove(PARENT_SPAN_ID);
        }
    }
    insert(headers, SAMPLED, if ctx.is_sampled() { "1" } else { "0" });
}

/// Read a context from `headers`. Returns `None` when the trace or span id is
/// missing or malformed.
pub fn extract(headers: &HeaderMap) -> Option<TraceContext> {
    let (trace_id, wide) = header_str(headers, &TRACE_ID).and_then(parse_trace_id)?;
    let span_id = header_str(headers, &SPAN_ID).and_then(parse_span_id)?;
    let parent = header_str(headers, &PARENT_SPAN_ID).and_then(parse_span_id);
    let sampled = header_str(headers, &SAMPLED)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(true);

    TraceContext::from_parts(trace_id, span_id, parent, sampled)
        .map(|ctx| ctx.with_wide_trace_id(wide))
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    // hex digits and "0"/"1" are always valid header values
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// B3 allows 64-bit (16 hex) or 128-bit (32 hex) trace ids. The width is
// returned so the id goes back out the way it came in.
fn parse_trace_id(value: &str) -> Option<(u128, bool)> {
    if (value.len() != 16 && value.len() != 32) || !is_hex(value) {
        return None;
    }
    let id = u128::from_str_radix(value, 16).ok()?;
    Some((id, value.len() == 32))
}

fn parse_span_id(value: &str) -> Option<u64> {
    if value.len() != 16 || !is_hex(value) {
        return None;
    }
    u64::from_str_radix(value, 16).ok()
}

// from_str_radix alone lets a leading '+' through
fn is_hex(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_hexdigit())
}
