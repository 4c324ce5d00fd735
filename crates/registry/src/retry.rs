//! Shared retry policy for calls to unreliable external collaborators.

use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff with jitter.
///
/// The registry never retries dispatch itself; tools and providers that talk
/// to flaky upstreams take a `RetryPolicy` at construction time instead of
/// hand-rolling backoff loops per call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on the random extra delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted, returning the
    /// last error.
    pub async fn run<T, E, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T, E>
    where
        E: std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        // Cap the shift so pathological attempt counts cannot overflow.
        let exponent = (attempt - 1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        if self.jitter.is_zero() {
            backoff
        } else {
            backoff + self.jitter.mul_f64(rand::random::<f64>())
        }
    }
}
