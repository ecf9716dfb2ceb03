//! Exponential backoff around provider calls.
//!
//! Only the adapter call boundary retries. Reconciliation never does: a store
//! error there is an item failure, not something time will fix.

use std::future::Future;
use std::time::Duration;

use paysync_core::InitialSyncConfig;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};

/// Upper bound for a single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further attempt.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: paysync_core::DEFAULT_MAX_RETRIES,
            base_delay: paysync_core::DEFAULT_RETRY_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy with the given retries and base delay.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: MAX_RETRY_DELAY,
        }
    }

    /// The policy a sync session runs under.
    #[must_use]
    pub fn from_config(config: &InitialSyncConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay)
    }

    /// Whether `error` should be retried after `attempt` failed attempts.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// A rate limit with a `retry_after` hint uses the hint; everything else
    /// backs off as `min(base_delay * 2^attempt, max_delay)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        if let ProviderError::RateLimited {
            retry_after: Some(hint),
        } = error
        {
            return (*hint).min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Run `f` until it succeeds, fails permanently, or retries run out.
    ///
    /// # Errors
    ///
    /// Returns the permanent error unchanged, or
    /// `ProviderError::RetriesExhausted` wrapping the last transient one.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if self.should_retry(attempt, &error) => {
                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) if error.is_transient() => {
                    warn!(
                        operation,
                        attempts = attempt + 1,
                        error = %error,
                        "Max retries exceeded"
                    );
                    return Err(ProviderError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt + 1,
                        last: Box::new(error),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> ProviderError {
        ProviderError::Api {
            status: 503,
            error_type: "api_error".into(),
            message: "unavailable".into(),
            code: None,
        }
    }

    #[test]
    fn default_policy_matches_sync_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(2));
        let err = unavailable();
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2, &err), Duration::from_secs(8));
        assert_eq!(policy.delay_for(8, &err), MAX_RETRY_DELAY);
        assert_eq!(policy.delay_for(40, &err), MAX_RETRY_DELAY);
    }

    #[test]
    fn rate_limit_hint_wins() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(7));
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert!(!policy.should_retry(0, &ProviderError::NotConfigured));
        assert!(policy.should_retry(2, &unavailable()));
        assert!(!policy.should_retry(3, &unavailable()));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);

        let result = policy
            .execute("list customers", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(unavailable())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute("list prices", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Http("timeout".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(ProviderError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ProviderError::Http(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_returns_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .execute("get customer", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::NotFound {
                        entity: "customer",
                        id: "cus_1".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ProviderError::NotFound { .. })));
    }
}
