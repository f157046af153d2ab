//! Exponential backoff for transient remote failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Retry ceiling and backoff curve for remote calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max_backoff`.
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exp);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs)
    }

    /// Wait before the next attempt. A server `Retry-After` hint is always
    /// honoured, even when it exceeds `max_backoff`.
    #[must_use]
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff_for(retry);
        retry_after.map_or(backoff, |hint| hint.max(backoff))
    }
}

/// Run `op` until it succeeds, fails non-transiently, or the attempt
/// ceiling is reached. Only `Error::TransientRemote` is retried; the last
/// transient error is returned once attempts are exhausted.
///
/// # Errors
///
/// Returns the first non-transient error, or the final transient one.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Error::TransientRemote {
                message,
                retry_after,
            }) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, retry_after);
                warn!(
                    what,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %message,
                    "Transient remote failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_for(1), Duration::from_millis(500));
        assert_eq!(p.backoff_for(2), Duration::from_secs(1));
        assert_eq!(p.backoff_for(3), Duration::from_secs(2));
        assert_eq!(p.backoff_for(20), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_hint_wins_when_longer() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.delay_for(1, Some(Duration::from_secs(60))),
            Duration::from_secs(60)
        );
        assert_eq!(
            p.delay_for(1, Some(Duration::from_millis(10))),
            Duration::from_millis(500)
        );
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let out = with_retry(&fast(), "fetch", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::TransientRemote {
                    message: "503".into(),
                    retry_after: None,
                })
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_surfaces_transient() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = with_retry(&fast(), "fetch", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::TransientRemote {
                message: "timeout".into(),
                retry_after: None,
            })
        })
        .await
        .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = with_retry(&fast(), "fetch", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::RemoteAuth("401".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::RemoteAuth(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
