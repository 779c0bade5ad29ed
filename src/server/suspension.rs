//! Suspended HTTP callers
//!
//! A route handler that awaits asynchronous work holds the caller in a
//! [`Suspension`]. The suspension resumes the caller with the work's outcome
//! or, once its timeout elapses, with [`Error::Timeout`]. Timing out only
//! stops waiting: work already dispatched keeps running until it finishes.

use std::future::Future;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Timeout-bounded wait for an asynchronous response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suspension {
    timeout: Duration,
    max_timeout: Duration,
}

impl Suspension {
    pub fn new(timeout: Duration, max_timeout: Duration) -> Self {
        Self {
            timeout,
            max_timeout,
        }
    }

    /// Suspension with the server's default and maximum timeouts
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.default_timeout(), config.max_suspend_timeout())
    }

    /// Request a different timeout. Zero and anything above the maximum are
    /// refused and leave the current timeout in place.
    pub fn set_timeout(&mut self, requested: Duration) -> bool {
        if requested.is_zero() || requested > self.max_timeout {
            return false;
        }
        self.timeout = requested;
        true
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for `work`, giving up after the timeout
    pub async fn resume<F, T>(self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Suspended request timed out");
                Err(Error::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PendingResult;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn suspension() -> Suspension {
        Suspension::new(Duration::from_secs(10), Duration::from_secs(60))
    }

    #[test]
    fn test_extension_within_maximum_accepted() {
        let mut s = suspension();
        assert!(s.set_timeout(Duration::from_secs(20)));
        assert_eq!(s.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_extension_above_maximum_refused() {
        let mut s = suspension();
        assert!(!s.set_timeout(Duration::from_secs(61)));
        assert!(!s.set_timeout(Duration::ZERO));
        assert_eq!(s.timeout(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_outcome() {
        let value = suspension().resume(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_cancel_work() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let work = PendingResult::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let err = suspension().resume(work).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(10)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(finished.load(Ordering::SeqCst));
    }
}
