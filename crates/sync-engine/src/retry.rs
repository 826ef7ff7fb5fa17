//! Retry with exponential backoff, shared by extraction, loading and
//! watermark commits.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ErrorClass, Result, SyncError};

/// Maps an error to retryable or fatal.
pub type Classifier = fn(&SyncError) -> ErrorClass;

/// Bounded retry policy.
///
/// Delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`, then scaled by a random factor in `[1 - jitter, 1 + jitter]`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay to randomize, 0.0 to 1.0
    pub jitter: f64,
    classify: Classifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            classify: SyncError::classify,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_classifier(mut self, classify: Classifier) -> Self {
        self.classify = classify;
        self
    }

    pub fn classify(&self, err: &SyncError) -> ErrorClass {
        (self.classify)(err)
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(20);
        let base = self.base_delay.saturating_mul(1u32 << exp);
        let capped = base.min(self.max_delay);
        if self.jitter <= 0.0 {
            return capped;
        }
        let factor = 1.0 + rand::rng().random_range(-self.jitter..=self.jitter);
        capped.mul_f64(factor.max(0.0))
    }

    /// Run `op` until it succeeds, fails fatally, exhausts the attempt budget
    /// or `cancel` fires.
    ///
    /// Cancellation interrupts both the in-flight attempt and the backoff
    /// sleep. Exhausting retries turns the last error into `RunFailed`.
    pub async fn run<T, F, Fut>(&self, what: &str, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                outcome = op() => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if self.classify(&err) == ErrorClass::Fatal {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                return Err(SyncError::RunFailed(format!(
                    "{what} failed after {attempt} attempts: {err}"
                )));
            }

            let delay = self.delay_for_attempt(attempt);
            warn!(
                "{} failed (attempt {}/{}), retrying in {:?}: {}",
                what, attempt, self.max_attempts, delay, err
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
