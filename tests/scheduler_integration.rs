//! Integration tests for the context scheduler
//!
//! These tests verify that:
//! - Delayed work observes the trace context of its submitter
//! - Context does not leak into later work on the same worker
//! - Periodic work keeps its context across runs
//! - Shutdown cancels work that has not started

use fanrelay::scheduler::{ContextScheduler, SchedulerError, WORKER_THREAD_NAME};
use fanrelay::trace::TraceContext;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_delayed_task_observes_submitting_context() {
    let scheduler = ContextScheduler::new().unwrap();
    let context = TraceContext::new_root();
    let submitted = Instant::now();

    let scheduled = context.sync_scope(|| {
        scheduler.schedule(Duration::from_millis(300), || {
            (
                TraceContext::current(),
                std::thread::current().name().map(str::to_string),
            )
        })
    });

    let (seen, thread) = scheduled.await.unwrap();
    assert!(submitted.elapsed() >= Duration::from_millis(300));
    assert_eq!(seen, Some(context));
    assert_eq!(thread.as_deref(), Some(WORKER_THREAD_NAME));

    // the worker reverted to no context after the task
    let after = scheduler.submit(TraceContext::current).await.unwrap();
    assert_eq!(after, None);
    // and the submitter was never touched
    assert_eq!(TraceContext::current(), None);
}

#[tokio::test]
async fn test_interleaved_contexts_stay_separate() {
    let scheduler = ContextScheduler::new().unwrap();
    let first = TraceContext::new_root();
    let second = TraceContext::new_root();

    let a = first.sync_scope(|| scheduler.schedule(Duration::from_millis(60), TraceContext::current));
    let b = second.sync_scope(|| scheduler.schedule(Duration::from_millis(20), TraceContext::current));

    assert_eq!(b.await.unwrap(), Some(second));
    assert_eq!(a.await.unwrap(), Some(first));
}

#[tokio::test]
async fn test_fixed_delay_keeps_context_between_runs() {
    let scheduler = ContextScheduler::new().unwrap();
    let context = TraceContext::new_root();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    let handle = context
        .sync_scope(|| {
            scheduler.schedule_with_fixed_delay(
                Duration::ZERO,
                Duration::from_millis(20),
                move || sink.lock().unwrap().push(TraceContext::current()),
            )
        })
        .unwrap();

    while seen.lock().unwrap().len() < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.cancel();

    let seen = seen.lock().unwrap().clone();
    assert!(seen.iter().all(|c| *c == Some(context)));
}

#[tokio::test]
async fn test_shutdown_cancels_delayed_work() {
    let scheduler = ContextScheduler::new().unwrap();
    let pending = scheduler.schedule(Duration::from_secs(30), || "late");

    scheduler.shutdown_now();

    let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap();
    assert_eq!(outcome, Err(SchedulerError::Cancelled));
}
