//! Bounded retry with exponential backoff for upstream data-source calls.

use std::time::Duration;

use tracing::warn;

use crate::error::{SearchError, SourceError};

/// Retry schedule for one upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff to wait after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Runs on a blocking worker thread, so backoff sleeps the thread. Transient
    /// failures that exhaust the budget surface as
    /// [`SearchError::UpstreamDataUnavailable`]; permanent ones are not retried.
    pub fn run<T, F>(&self, mut call: F) -> Result<T, SearchError>
    where
        F: FnMut() -> Result<T, SourceError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        source = err.source_name(),
                        attempt,
                        max_attempts = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "upstream call failed, retrying"
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
