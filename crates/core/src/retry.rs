use crate::ServiceError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

/// Timeout and bounded retry applied around every external service call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl CallPolicy {
    pub fn new(
        timeout: Duration,
        max_retries: usize,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
    ) -> Self {
        Self {
            timeout,
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn no_retry(timeout: Duration) -> Self {
        Self::new(timeout, 0, 0, 0)
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. A call exceeding `timeout` counts as a failure.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut call: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let outcome = match timeout(self.timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ServiceError::Timeout {
                    operation: operation.to_string(),
                    after_ms: self.timeout.as_millis(),
                }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempts = attempt + 1, "call succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    attempt += 1;
                    if attempt > self.max_retries || !error.is_retryable() {
                        return Err(error);
                    }

                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "call failed, retrying"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn throttled() -> ServiceError {
        ServiceError::BackendResponse {
            backend: "test".to_string(),
            status: 503,
            details: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = CallPolicy::new(Duration::from_secs(1), 3, 1, 2);

        let result = policy
            .run("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(throttled())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.ok(), Some("done"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = CallPolicy::new(Duration::from_secs(1), 3, 1, 2);

        let result: Result<(), _> = policy
            .run("rejected", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::Request("bad prompt".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let policy = CallPolicy::no_retry(Duration::from_millis(20));

        let result = policy
            .run("slow", || async {
                sleep(Duration::from_millis(500)).await;
                Ok(1)
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Timeout { .. })));
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = CallPolicy::new(Duration::from_secs(1), 2, 1, 1);

        let result: Result<(), _> = policy
            .run("down", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(throttled())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
