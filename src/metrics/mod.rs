//! Prometheus metrics for the relay
//!
//! This module provides metrics tracking for:
//! - Dispatch: outcomes and latency of single backend requests
//! - Failover: transitions between candidates and exhausted chains
//! - Fan-out: member counts and end-to-end join duration by outcome
//! - Scheduler: outcomes of scheduled tasks
//! - API: requests served per route and status
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all relay metrics
struct RelayMetrics {
    dispatches: CounterVec,
    dispatch_duration: HistogramVec,
    failovers: Counter,
    exhausted_chains: Counter,
    fanout_members: CounterVec,
    fanout_duration: HistogramVec,
    scheduled_tasks: CounterVec,
    api_requests: CounterVec,
}

/// Global storage for relay metrics
static RELAY_METRICS: OnceLock<RelayMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

/// Held for the whole of `init_metrics` so concurrent callers see a
/// finished registration
static METRICS_INIT_LOCK: Mutex<()> = Mutex::new(());

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = fanrelay::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = METRICS_INIT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = RelayMetrics {
        dispatches: register_counter_vec!(
            "fanrelay_dispatches_total",
            "Backend dispatches by outcome",
            &["outcome"]
        )?,
        dispatch_duration: register_histogram_vec!(
            "fanrelay_dispatch_duration_seconds",
            "Backend dispatch duration in seconds",
            &["outcome"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
        )?,
        failovers: register_counter!(
            "fanrelay_failover_transitions_total",
            "Times a failed candidate was followed by the next one"
        )?,
        exhausted_chains: register_counter!(
            "fanrelay_failover_exhausted_total",
            "Failover chains in which every candidate failed"
        )?,
        fanout_members: register_counter_vec!(
            "fanrelay_fanout_members_total",
            "Requests issued by fan-out calls by outcome",
            &["outcome"]
        )?,
        fanout_duration: register_histogram_vec!(
            "fanrelay_fanout_duration_seconds",
            "Time from fan-out dispatch to joined result in seconds",
            &["outcome"],
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]
        )?,
        scheduled_tasks: register_counter_vec!(
            "fanrelay_scheduled_tasks_total",
            "Scheduled task runs by outcome",
            &["outcome"]
        )?,
        api_requests: register_counter_vec!(
            "fanrelay_api_requests_total",
            "API requests by route and status",
            &["route", "status"]
        )?,
    };

    RELAY_METRICS
        .set(metrics)
        .map_err(|_| "Relay metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    RELAY_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one backend dispatch
pub fn record_dispatch(outcome: &str, elapsed: Duration) {
    let Some(m) = RELAY_METRICS.get() else {
        return;
    };
    m.dispatches.with_label_values(&[outcome]).inc();
    m.dispatch_duration
        .with_label_values(&[outcome])
        .observe(elapsed.as_secs_f64());
}

/// Record a failover transition
pub fn record_failover() {
    if let Some(m) = RELAY_METRICS.get() {
        m.failovers.inc();
    }
}

/// Record a chain in which every candidate failed
pub fn record_exhausted() {
    if let Some(m) = RELAY_METRICS.get() {
        m.exhausted_chains.inc();
    }
}

/// Record a settled fan-out, successful or not
pub fn record_fanout(outcome: &str, members: usize, elapsed: Duration) {
    let Some(m) = RELAY_METRICS.get() else {
        return;
    };
    m.fanout_members
        .with_label_values(&[outcome])
        .inc_by(members as f64);
    m.fanout_duration
        .with_label_values(&[outcome])
        .observe(elapsed.as_secs_f64());
}

/// Record a scheduled task outcome
pub fn record_scheduled_task(outcome: &str) {
    if let Some(m) = RELAY_METRICS.get() {
        m.scheduled_tasks.with_label_values(&[outcome]).inc();
    }
}

/// Record an API request
pub fn record_api_request(route: &str, status: u16) {
    if let Some(m) = RELAY_METRICS.get() {
        let status = status.to_string();
        m.api_requests.with_label_values(&[route, &status]).inc();
    }
}
