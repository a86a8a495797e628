//! Retry with exponential backoff and jitter
//!
//! Transient transport failures back off `base * 2^attempt` plus uniform
//! jitter in `[0, base/2)`, capped at 30 seconds. Cancellation is honored
//! before every attempt and during waits.

use crate::config::IndexingConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound on a single backoff wait
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Classified failure from a single attempt
#[derive(Debug)]
pub enum RetryError {
    /// Worth another attempt (rate limit, 5xx, timeout, reset)
    Transient(Error),
    /// Retrying cannot help (auth failure, malformed request)
    Fatal(Error),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &IndexingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// Backoff before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let exp_ms = base_ms.saturating_mul(factor);
        let jitter_ms = if base_ms >= 2 {
            rand::rng().random_range(0..base_ms / 2)
        } else {
            0
        };
        Duration::from_millis(exp_ms.saturating_add(jitter_ms)).min(MAX_BACKOFF)
    }

    /// Drive `operation` until success, a fatal error, retry exhaustion,
    /// or cancellation
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RetryError>>,
    {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match operation().await {
                Ok(value) => return Ok(value),
                Err(RetryError::Fatal(err)) => return Err(err),
                Err(RetryError::Transient(err)) => {
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
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

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
        };
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let start = tokio::time::Instant::now();

        let result = policy
            .run(&cancel, move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(RetryError::Transient(Error::embedding("503 from backend")))
                    } else {
                        Ok(vec![1.0f32, 2.0])
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), vec![1.0, 2.0]);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // backoff floor: 100ms then 200ms, jitter on top
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = policy
            .run(&cancel, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RetryError::Fatal(Error::embedding("401 unauthorized")))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_transient_error() {
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(10),
        };
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = policy
            .run(&cancel, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RetryError::Transient(Error::embedding("still down")))
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Embedding { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_any_attempt() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = policy
            .run(&cancel, || async { Ok(()) })
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(20), MAX_BACKOFF);
        assert!(policy.delay_for(0) >= Duration::from_millis(500));
        assert!(policy.delay_for(1) >= Duration::from_millis(1000));
    }
}
