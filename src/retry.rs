//! Exponential backoff shared by every network call site.
//!
//! [`Backoff::run`] retries an async operation until it succeeds or the
//! attempt budget is spent. The fetch and generation decorators
//! ([`crate::fetcher::RetryFetch`], [`crate::api::RetryAsk`]) both delegate
//! here so the policy lives in one place.
//!
//! The delay before retry `n` (1-based) is
//!
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + jitter(0..=base_delay/4)
//! ```

use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first. Never below one.
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay to wait after the `attempt`-th failure, before jitter.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(1 << shift)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds or `max_attempts` is reached.
    ///
    /// # Arguments
    ///
    /// * `label` - Identifies the operation in log events
    /// * `op` - Produces a fresh future for every attempt
    ///
    /// # Returns
    ///
    /// The first success, or the error of the last attempt.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let backoff = Backoff::new(3, Duration::from_millis(500));
    /// let body = backoff.run(url, || fetcher.fetch(url)).await?;
    /// ```
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt >= self.max_attempts {
                        error!(
                            label,
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt) + self.jitter();
                    warn!(
                        label,
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    fn jitter(&self) -> Duration {
        let ceiling = (self.base_delay.as_millis() / 4) as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng().random_range(0..=ceiling))
    }
}
