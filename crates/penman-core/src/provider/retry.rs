//! Bounded retry with exponential backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::error::ProviderError;

type RetryPredicate = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

/// How many times to attempt a call and how long to wait in between.
///
/// Delay before retry `n` (1-based) is `base_delay * multiplier^(n-1)`,
/// capped at `max_delay`. A `Retry-After` hint from a 429 raises the delay
/// to at least the hinted value, still subject to the cap.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    predicate: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
            predicate: Arc::new(ProviderError::is_transient),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("multiplier", &self.multiplier)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// `max_attempts` tries with no delay between them. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::immediate(1)
    }

    /// Replace the default "is transient" predicate.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ProviderError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn should_retry(&self, error: &ProviderError) -> bool {
        !error.is_fatal() && (self.predicate)(error)
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let exp = retry.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exp);
        let backoff = self.base_delay.saturating_mul(factor);
        let delay = match hint {
            Some(h) => backoff.max(h),
            None => backoff,
        };
        delay.min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && self.should_retry(&err) => {
                    let hint = match &err {
                        ProviderError::RateLimited { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let delay = self.delay_for(attempt, hint);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "provider call failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::ProviderKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(p.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(p.delay_for(3, None), Duration::from_secs(4));
        assert_eq!(p.delay_for(10, None), Duration::from_secs(30));
    }

    #[test]
    fn retry_after_hint_raises_delay_but_respects_cap() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.delay_for(1, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            p.delay_for(1, Some(Duration::from_secs(120))),
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run(move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Transport("down".into()))
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_fatal_errors() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(5)
            .with_predicate(|_| true)
            .run(move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Authentication {
                    provider: ProviderKind::Gemini,
                    status: 401,
                    message: String::new(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_on_later_attempt() {
        let result = RetryPolicy::immediate(3)
            .run(|attempt| async move {
                if attempt < 3 {
                    Err(ProviderError::Timeout(Duration::from_secs(1)))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn custom_predicate_can_retry_malformed() {
        let calls = &AtomicU32::new(0);
        let _ = RetryPolicy::immediate(2)
            .with_predicate(|e| matches!(e, ProviderError::MalformedResponse(_)))
            .run(move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProviderError::MalformedResponse("empty".into()))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
