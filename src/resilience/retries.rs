//! Fixed-delay retry for chain lookups.
//!
//! # Responsibilities
//! - Re-run a lookup a bounded number of times with a constant pause
//! - Stop early on errors the caller marks as final (e.g. unsupported)
//! - Abort the wait as soon as the owning shutdown token fires
//!
//! # Design Decisions
//! - Delay is constant: lookups wait for propagation, not for a
//!   recovering backend, so exponential growth buys nothing
//! - Broadcasts are never retried here

use std::future::Future;
use std::time::Duration;

use crate::lifecycle::Shutdown;

/// How often and how long to retry a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub const NONE: RetryPolicy = RetryPolicy {
        retries: 0,
        delay: Duration::ZERO,
    };

    pub const fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            delay: Duration::from_secs(10),
        }
    }
}

/// Marker returned through `E: From<Cancelled>` when shutdown interrupts a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Run `op` until it succeeds, the policy is exhausted, `is_final` says the
/// error must not be retried, or `shutdown` fires during a pause.
pub async fn retry_fixed<T, E, F, Fut>(
    policy: RetryPolicy,
    shutdown: &Shutdown,
    what: &str,
    is_final: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: From<Cancelled> + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut remaining = policy.retries;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if remaining == 0 || is_final(&e) => return Err(e),
            Err(e) => {
                remaining -= 1;
                tracing::debug!(
                    what,
                    error = %e,
                    retry_in_ms = policy.delay.as_millis() as u64,
                    remaining,
                    "Lookup failed, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(policy.delay) => {}
                    _ = shutdown.cancelled() => return Err(E::from(Cancelled)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Miss,
        Fatal,
        Cancelled,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl From<Cancelled> for TestError {
        fn from(_: Cancelled) -> Self {
            TestError::Cancelled
        }
    }

    fn fast(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_after_misses() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, TestError> = retry_fixed(fast(5), &Shutdown::new(), "tx", |_| false, || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 3 { Err(TestError::Miss) } else { Ok(n) }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_policy() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), TestError> = retry_fixed(fast(5), &Shutdown::new(), "tx", |_| false, || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Miss) }
        })
        .await;
        assert_eq!(result, Err(TestError::Miss));
        // first attempt + 5 retries
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_final_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), TestError> = retry_fixed(
            fast(5),
            &Shutdown::new(),
            "tx",
            |e| *e == TestError::Fatal,
            || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            },
        )
        .await;
        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_wait() {
        let shutdown = Shutdown::new();
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        let result: Result<(), TestError> = tokio::time::timeout(
            Duration::from_secs(2),
            retry_fixed(policy, &shutdown, "tx", |_| false, || async { Err(TestError::Miss) }),
        )
        .await
        .expect("retry loop must observe shutdown");
        assert_eq!(result, Err(TestError::Cancelled));
    }
}
