use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::StrategyConfig;
use crate::error::{RetryError, SwapError};

/// Fixed-count, fixed-delay retry around a single swap attempt.
///
/// No backoff and no jitter. Cancellation is honoured before every attempt
/// and while waiting between attempts; an attempt already in flight is
/// always allowed to finish.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `operation` until it succeeds, attempts run out, or `cancel` fires.
    /// The closure gets the 1-based attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SwapError>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                });
            }

            tracing::info!("Swap attempt {}/{}", attempt, self.attempts);

            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        retryable = e.is_retryable(),
                        "Swap attempt failed: {}",
                        e
                    );
                    last_error = Some(e);
                }
            }

            if attempt < self.attempts {
                tracing::info!("Retrying in {:?}...", self.delay);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Cancelled while waiting to retry");
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }

        Err(RetryError::ExhaustedRetries {
            attempts: self.attempts,
            last: last_error
                .unwrap_or_else(|| SwapError::Other("no attempt was made".to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Operation that fails `failures` times, then succeeds
    fn flaky(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut(u32) -> std::pin::Pin<Box<dyn Future<Output = Result<u32, SwapError>> + Send>>
    {
        move |attempt| {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(SwapError::Send(format!("rpc blip #{}", n)))
                } else {
                    Ok(attempt)
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(2));

        let result = policy
            .run(&CancellationToken::new(), flaky(0, calls.clone()))
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_k_failures_then_success() {
        for n in 1..=4u32 {
            for k in 0..=5u32 {
                let calls = Arc::new(AtomicU32::new(0));
                let policy = RetryPolicy::new(n, Duration::from_secs(2));

                let result = policy
                    .run(&CancellationToken::new(), flaky(k, calls.clone()))
                    .await;

                if k < n {
                    assert_eq!(result.unwrap(), k + 1, "n={} k={}", n, k);
                    assert_eq!(calls.load(Ordering::SeqCst), k + 1);
                } else {
                    match result {
                        Err(RetryError::ExhaustedRetries { attempts, last }) => {
                            assert_eq!(attempts, n);
                            assert!(last.to_string().contains(&format!("#{}", n)));
                        }
                        other => panic!("n={} k={}: unexpected {:?}", n, k, other),
                    }
                    assert_eq!(calls.load(Ordering::SeqCst), n);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        let result = policy
            .run(&CancellationToken::new(), flaky(10, calls.clone()))
            .await;

        assert!(result.is_err());
        // Two waits between three attempts, none after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(6), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_stops_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                cancel.cancel();
            })
        };

        let result = policy.run(&cancel, flaky(10, calls.clone())).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = policy.run(&cancel, flaky(0, calls.clone())).await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.attempts(), 1);
    }
}
