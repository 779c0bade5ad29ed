//! Pending results and fan-in
//!
//! A [`PendingResult`] is the single-assignment future every asynchronous
//! operation in this crate hands back. Its work is spawned onto the runtime
//! the moment it is created, so dispatch never waits for a consumer to poll.
//!
//! [`join_all`] combines already-dispatched pending results into one that
//! resolves to their values in submission order.
//!
//! # Failure policy
//!
//! Members are awaited in submission order. The first failure met in that
//! order fails the aggregate with [`Error::AggregateMemberFailed`], so the
//! reported member is always the lowest-index failure. Members after it are
//! no longer awaited; their work is not cancelled and runs to completion in
//! the background.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::trace;

// ============================================================================
// Pending Result
// ============================================================================

/// Future of a value or a failure, resolved exactly once
#[must_use = "a pending result's outcome is only observable by awaiting it"]
pub struct PendingResult<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Spawned(JoinHandle<Result<T>>),
    Resolved(Option<Result<T>>),
}

// never pin-projects into `T`
impl<T> Unpin for PendingResult<T> {}

impl<T> PendingResult<T>
where
    T: Send + 'static,
{
    /// Start `work` on the current runtime now. The submitter's trace
    /// context and tracing span travel with it.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: Inner::Spawned(tokio::spawn(trace::propagate(work))),
        }
    }
}

impl<T> PendingResult<T> {
    /// An already successful result
    pub fn ready(value: T) -> Self {
        Self {
            inner: Inner::Resolved(Some(Ok(value))),
        }
    }

    /// An already failed result
    pub fn failed(error: Error) -> Self {
        Self {
            inner: Inner::Resolved(Some(Err(error))),
        }
    }

    /// Whether the outcome is available without waiting
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Spawned(handle) => handle.is_finished(),
            Inner::Resolved(_) => true,
        }
    }
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Task(e.to_string())),
            }),
            Inner::Resolved(outcome) => Poll::Ready(
                outcome
                    .take()
                    .unwrap_or_else(|| Err(Error::Task("result already taken".to_string()))),
            ),
        }
    }
}

impl<T> std::fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult")
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ============================================================================
// Fan-in
// ============================================================================

/// Join dispatched members into one ordered result
pub fn join_all<T>(members: Vec<PendingResult<T>>) -> PendingResult<Vec<T>>
where
    T: Send + 'static,
{
    if members.is_empty() {
        return PendingResult::ready(Vec::new());
    }

    let total = members.len();
    PendingResult::spawn(async move {
        let mut values = Vec::with_capacity(total);
        for (index, member) in members.into_iter().enumerate() {
            match member.await {
                Ok(value) => values.push(value),
                Err(source) => {
                    tracing::warn!(index, total, error = %source, "Fan-out member failed");
                    return Err(Error::AggregateMemberFailed {
                        index,
                        total,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(values)
    })
}

/// Wait for every member and return each outcome in submission order
pub fn join_all_settled<T>(members: Vec<PendingResult<T>>) -> PendingResult<Vec<Result<T>>>
where
    T: Send + 'static,
{
    if members.is_empty() {
        return PendingResult::ready(Vec::new());
    }

    PendingResult::spawn(async move {
        Ok(futures::future::join_all(members).await)
    })
}
