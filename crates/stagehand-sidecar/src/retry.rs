use std::future::Future;
use std::time::Duration;

/// Bounded fixed-delay retry.
///
/// The readiness check is the one place in the protocol where retrying is
/// allowed: the sidecar may still be starting, so connection failures get
/// another chance. Every other call is single-shot. Keeping the policy as a
/// value (rather than a loop at the call site) lets tests shrink the delay
/// and lets callers state the budget explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// The readiness budget: 5 attempts, 5 seconds apart.
    pub fn readiness() -> Self {
        Self::new(5, Duration::from_secs(5))
    }

    /// Run `op` until it succeeds, the error stops being `retryable`, or the
    /// attempt budget is exhausted. The last error is returned as-is.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "retryable failure, waiting before next attempt"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SidecarError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(fail_times: u32) -> (AtomicU32, impl Fn(&AtomicU32) -> Result<(), SidecarError>) {
        (AtomicU32::new(0), move |calls: &AtomicU32| {
            if calls.fetch_add(1, Ordering::Relaxed) < fail_times {
                Err(SidecarError::Unreachable("connection refused".into()))
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_within_budget() {
        let policy = RetryPolicy::readiness();
        let (calls, op) = flaky(3);

        let result = policy
            .run(|| async { op(&calls) }, SidecarError::is_unreachable)
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_after_five_attempts() {
        let policy = RetryPolicy::readiness();
        let (calls, op) = flaky(u32::MAX);

        let result = policy
            .run(|| async { op(&calls) }, SidecarError::is_unreachable)
            .await;

        assert!(matches!(result, Err(SidecarError::Unreachable(_))));
        assert_eq!(calls.load(Ordering::Relaxed), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_not_retried() {
        let policy = RetryPolicy::readiness();
        let calls = AtomicU32::new(0);

        let result: Result<(), SidecarError> = policy
            .run(
                || async {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Err(SidecarError::Rejected {
                        status: 400,
                        body: "bad state".into(),
                    })
                },
                SidecarError::is_unreachable,
            )
            .await;

        assert!(matches!(result, Err(SidecarError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
