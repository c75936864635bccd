//! Retry with exponential backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ChatError, ErrorCategory};

/// Source of backoff sleeps. Swapped for a recording clock in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Progress of one retried exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based attempt number about to run.
    pub attempt: u32,
    /// Delay to wait before the next attempt.
    pub delay: Duration,
}

/// Retry policy configuration.
///
/// The delay sequence is deterministic: `min(initial * multiplier^k, max)`.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Also retry 400-class request rejections.
    pub retry_bad_request: bool,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("multiplier", &self.multiplier)
            .field("retry_bad_request", &self.retry_bad_request)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            retry_bad_request: false,
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            ..Self::default()
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_bad_request(mut self, enabled: bool) -> Self {
        self.retry_bad_request = enabled;
        self
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let secs = self.initial_backoff.as_secs_f64() * factor;
        let capped = secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    fn should_retry(&self, error: &ChatError) -> bool {
        error.is_retryable()
            || (self.retry_bad_request && error.category() == ErrorCategory::BadRequest)
    }

    /// Execute an async operation with retry.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ChatError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChatError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut state = RetryState {
            attempt: 1,
            delay: self.initial_backoff.min(self.max_backoff),
        };

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.should_retry(&error) {
                return Err(error);
            }
            if state.attempt >= max_attempts {
                tracing::warn!(attempts = state.attempt, error = %error, "Retries exhausted");
                return Err(ChatError::RetriesExhausted {
                    attempts: state.attempt,
                    source: Box::new(error),
                });
            }

            let hinted = error
                .retry_after_ms()
                .map(Duration::from_millis)
                .unwrap_or_default();
            let wait = state.delay.max(hinted).min(self.max_backoff);

            tracing::warn!(
                attempt = state.attempt,
                max_attempts,
                delay_ms = wait.as_millis() as u64,
                error = %error,
                "Retrying after error"
            );

            self.sleeper.sleep(wait).await;

            state = RetryState {
                attempt: state.attempt + 1,
                delay: self.delay_for(state.attempt),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_sequence_doubles_up_to_cap() {
        let policy = RetryPolicy::new(8, Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (0..5).map(|k| policy.delay_for(k).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn bad_request_is_retried_only_when_enabled() {
        let err = ChatError::api(400, "bad");
        assert!(!RetryPolicy::default().should_retry(&err));
        assert!(RetryPolicy::default()
            .with_retry_bad_request(true)
            .should_retry(&err));
    }
}
