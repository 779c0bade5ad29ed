//! Request-scoped trace context
//!
//! A [`TraceContext`] identifies the logical request that a piece of work
//! belongs to. The active context lives in a tokio task-local, so it is only
//! visible to the task that attached it. Anything that hands work to another
//! task or worker must capture the context at hand-off time and re-attach it
//! when the work runs; [`propagate`] and the scheduler do exactly that.
//!
//! Every API that depends on the ambient context also has an explicit form
//! taking a `TraceContext` value, so callers can pass context by hand.

pub mod b3;

use std::fmt;
use std::future::Future;

use tracing::Instrument;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// Correlation identifiers for one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceContext {
    trace_id: u128,
    span_id: u64,
    parent_span_id: Option<u64>,
    sampled: bool,
    // 128-bit ids print as 32 hex digits, 64-bit ids as 16
    wide: bool,
}

impl TraceContext {
    /// Start a new trace
    pub fn new_root() -> Self {
        Self {
            trace_id: Uuid::new_v4().as_u128(),
            span_id: next_span_id(),
            parent_span_id: None,
            sampled: true,
            wide: true,
        }
    }

    /// Build a context from known identifiers. Zero ids are rejected.
    ///
    /// A trace id that fits in 64 bits is treated as a 64-bit id; use
    /// [`TraceContext::with_wide_trace_id`] to keep the 128-bit form.
    pub fn from_parts(
        trace_id: u128,
        span_id: u64,
        parent_span_id: Option<u64>,
        sampled: bool,
    ) -> Option<Self> {
        if trace_id == 0 || span_id == 0 {
            return None;
        }
        Some(Self {
            trace_id,
            span_id,
            parent_span_id: parent_span_id.filter(|id| *id != 0),
            sampled,
            wide: trace_id > u128::from(u64::MAX),
        })
    }

    /// Set whether the trace id is rendered as a 128-bit id. Ignored when the
    /// id does not fit in 64 bits.
    #[must_use]
    pub fn with_wide_trace_id(mut self, wide: bool) -> Self {
        self.wide = wide || self.trace_id > u128::from(u64::MAX);
        self
    }

    /// Derive a child span within the same trace
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: next_span_id(),
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
            wide: self.wide,
        }
    }

    pub fn trace_id(&self) -> u128 {
        self.trace_id
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn parent_span_id(&self) -> Option<u64> {
        self.parent_span_id
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Whether the trace id is a 128-bit id
    pub fn has_wide_trace_id(&self) -> bool {
        self.wide
    }

    /// Trace id as lowercase hex, 32 digits for 128-bit ids and 16 for
    /// 64-bit ids
    pub fn trace_id_hex(&self) -> String {
        if self.wide {
            format!("{:032x}", self.trace_id)
        } else {
            format!("{:016x}", self.trace_id)
        }
    }

    /// Span id as 16 lowercase hex digits
    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    /// The context attached to the running task, if any
    pub fn current() -> Option<Self> {
        CURRENT.try_with(|ctx| *ctx).ok()
    }

    /// Run `fut` with this context attached. The previous context is restored
    /// when the future completes or is dropped.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, fut).await
    }

    /// Synchronous form of [`TraceContext::scope`]. The previous context is
    /// restored even if `f` panics.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self, f)
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.trace_id_hex(), self.span_id_hex())
    }
}

fn next_span_id() -> u64 {
    loop {
        let id: u64 = rand::random();
        if id != 0 {
            return id;
        }
    }
}

/// Capture the current trace context and tracing span, and re-attach both
/// around `fut` wherever it is eventually polled.
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    propagate_with(TraceContext::current(), fut)
}

/// Explicit form of [`propagate`]: attach `context` (if any) and the current
/// tracing span around `fut`.
pub fn propagate_with<F>(
    context: Option<TraceContext>,
    fut: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let fut = fut.instrument(tracing::Span::current());
    async move {
        match context {
            Some(ctx) => ctx.scope(fut).await,
            None => fut.await,
        }
    }
}

/// Run `f` with `context` attached when one is given
pub fn run_with<R>(context: Option<TraceContext>, f: impl FnOnce() -> R) -> R {
    match context {
        Some(ctx) => ctx.sync_scope(f),
        None => f(),
    }
}
