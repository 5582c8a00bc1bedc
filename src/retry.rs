//! Bounded retry with a fixed or exponential delay.

use std::{fmt::Display, future::Future, time::Duration};
use tracing::warn;

/// How the wait between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Wait the same delay before every retry.
    #[default]
    Fixed,
    /// Double the delay after every failed attempt.
    Exponential,
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// One retry after two seconds.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        }
    }

    /// Runs `op` until it succeeds, fails with an error `is_retryable` rejects, or the
    /// attempts are used up. The last error is returned.
    pub async fn run<T, E, F, Fut, P>(&self, operation: &str, is_retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts && is_retryable(&error) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
