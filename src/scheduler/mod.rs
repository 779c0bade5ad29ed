//! Context-propagating task scheduler
//!
//! [`ContextScheduler`] runs delayed and periodic work on its own
//! single-worker runtime. Every submission captures the [`TraceContext`] and
//! tracing span of the submitter and re-attaches both while the task body
//! runs, so work that executes later and on another thread still belongs to
//! the request that scheduled it.
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use fanrelay::scheduler::ContextScheduler;
//!
//! let scheduler = ContextScheduler::new()?;
//! let value = scheduler.schedule(Duration::from_secs(1), || 42).await?;
//! scheduler.shutdown_now();
//! ```

pub mod error;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Span;

use crate::metrics;
use crate::trace::{self, TraceContext};

pub use error::{SchedulerError, SchedulerResult};

/// Thread name of the scheduler worker
pub const WORKER_THREAD_NAME: &str = "fanrelay-scheduler";

// ============================================================================
// Scheduler
// ============================================================================

/// Delayed/periodic task scheduler that carries trace context to its tasks
pub struct ContextScheduler {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    shutdown: watch::Sender<bool>,
}

impl ContextScheduler {
    /// Start a scheduler with one dedicated worker thread
    pub fn new() -> SchedulerResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(WORKER_THREAD_NAME)
            .enable_time()
            .build()
            .map_err(|e| SchedulerError::RuntimeInit {
                reason: e.to_string(),
            })?;
        let handle = runtime.handle().clone();
        let (shutdown, _) = watch::channel(false);

        tracing::debug!("Scheduler worker started");

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
            shutdown,
        })
    }

    /// Run `task` as soon as the worker is free
    pub fn submit<F, T>(&self, task: F) -> Scheduled<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.schedule_with_context(TraceContext::current(), Duration::ZERO, task)
    }

    /// Run `task` once after `delay`
    pub fn schedule<F, T>(&self, delay: Duration, task: F) -> Scheduled<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.schedule_with_context(TraceContext::current(), delay, task)
    }

    /// Run `task` once after `delay` with `context` attached
    pub fn schedule_with_context<F, T>(
        &self,
        context: Option<TraceContext>,
        delay: Duration,
        task: F,
    ) -> Scheduled<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_shutdown() {
            return Scheduled::failed(SchedulerError::ShutDown);
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let span = Span::current();

        let handle = self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = wait_for_shutdown(&mut shutdown_rx) => {
                        metrics::record_scheduled_task("cancelled");
                        return Err(SchedulerError::Cancelled);
                    }
                }
            }
            if *shutdown_rx.borrow() {
                metrics::record_scheduled_task("cancelled");
                return Err(SchedulerError::Cancelled);
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                span.in_scope(|| trace::run_with(context, task))
            }));

            match outcome {
                Ok(value) => {
                    metrics::record_scheduled_task("completed");
                    Ok(value)
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(error = %message, "Scheduled task panicked");
                    metrics::record_scheduled_task("panicked");
                    Err(SchedulerError::task_panicked(message))
                }
            }
        });

        Scheduled {
            inner: ScheduledInner::Spawned(handle),
        }
    }

    /// Run `task` every `period`, starting after `initial_delay`. Missed
    /// ticks are run back to back to keep the rate.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: F,
    ) -> SchedulerResult<PeriodicHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_at_fixed_rate_with_context(TraceContext::current(), initial_delay, period, task)
    }

    /// Explicit-context form of [`ContextScheduler::schedule_at_fixed_rate`]
    pub fn schedule_at_fixed_rate_with_context<F>(
        &self,
        context: Option<TraceContext>,
        initial_delay: Duration,
        period: Duration,
        mut task: F,
    ) -> SchedulerResult<PeriodicHandle>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulerError::invalid_period("period"));
        }
        if self.is_shutdown() {
            return Err(SchedulerError::ShutDown);
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let span = Span::current();

        let handle = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = wait_for_shutdown(&mut shutdown_rx) => break,
                }
                if !run_periodic(&span, context, &mut task) {
                    break;
                }
            }
        });

        Ok(PeriodicHandle { handle })
    }

    /// Run `task` repeatedly with `delay` between the end of one run and the
    /// start of the next, starting after `initial_delay`
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        task: F,
    ) -> SchedulerResult<PeriodicHandle>
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_with_fixed_delay_with_context(TraceContext::current(), initial_delay, delay, task)
    }

    /// Explicit-context form of [`ContextScheduler::schedule_with_fixed_delay`]
    pub fn schedule_with_fixed_delay_with_context<F>(
        &self,
        context: Option<TraceContext>,
        initial_delay: Duration,
        delay: Duration,
        mut task: F,
    ) -> SchedulerResult<PeriodicHandle>
    where
        F: FnMut() + Send + 'static,
    {
        if delay.is_zero() {
            return Err(SchedulerError::invalid_period("delay"));
        }
        if self.is_shutdown() {
            return Err(SchedulerError::ShutDown);
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let span = Span::current();

        let handle = self.handle.spawn(async move {
            let mut wait = initial_delay;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = wait_for_shutdown(&mut shutdown_rx) => break,
                }
                if !run_periodic(&span, context, &mut task) {
                    break;
                }
                wait = delay;
            }
        });

        Ok(PeriodicHandle { handle })
    }

    /// Cancel every task that has not started yet and release the worker
    /// without waiting for in-flight tasks. Idempotent.
    pub fn shutdown_now(&self) {
        self.shutdown.send_replace(true);

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(runtime) = runtime {
            runtime.shutdown_background();
            tracing::info!("Scheduler shut down");
        }
    }

    /// Whether [`ContextScheduler::shutdown_now`] has been called
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl Drop for ContextScheduler {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

impl std::fmt::Debug for ContextScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextScheduler")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Run one periodic iteration. Returns false when the task panicked and the
/// periodic schedule must stop.
fn run_periodic<F>(span: &Span, context: Option<TraceContext>, task: &mut F) -> bool
where
    F: FnMut(),
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        span.in_scope(|| trace::run_with(context, &mut *task))
    }));

    match outcome {
        Ok(()) => {
            metrics::record_scheduled_task("completed");
            true
        }
        Err(payload) => {
            tracing::error!(
                error = %panic_message(payload.as_ref()),
                "Periodic task panicked, cancelling further runs"
            );
            metrics::record_scheduled_task("panicked");
            false
        }
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Future of a one-shot scheduled task
#[must_use = "a scheduled task's result is only observable by awaiting it"]
pub struct Scheduled<T> {
    inner: ScheduledInner<T>,
}

enum ScheduledInner<T> {
    Spawned(JoinHandle<SchedulerResult<T>>),
    Failed(Option<SchedulerError>),
}

impl<T> Scheduled<T> {
    fn failed(err: SchedulerError) -> Self {
        Self {
            inner: ScheduledInner::Failed(Some(err)),
        }
    }
}

impl<T> Future for Scheduled<T> {
    type Output = SchedulerResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            ScheduledInner::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| {
                // task bodies catch their own panics, so a join error means
                // the worker runtime dropped the task
                joined.unwrap_or(Err(SchedulerError::Cancelled))
            }),
            ScheduledInner::Failed(err) => {
                Poll::Ready(Err(err.take().unwrap_or(SchedulerError::Cancelled)))
            }
        }
    }
}

/// Handle to a periodic task
#[derive(Debug)]
pub struct PeriodicHandle {
    handle: JoinHandle<()>,
}

impl PeriodicHandle {
    /// Stop further runs. A run in progress completes.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the periodic task has stopped
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ============================================================================
// Tests
// ============================================================================
