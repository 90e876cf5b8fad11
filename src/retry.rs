//! Bounded retries with exponential backoff for external calls.
//!
//! Embedding and generation requests go over the network; transient
//! failures are retried here and only surface to callers once the retry
//! budget is exhausted.

use std::future::Future;
use std::time::Duration;

use crate::types::SolaceError;

/// Retry budget applied to a single logical external call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    pub attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Runs `op`, retrying transient failures until the budget runs out.
    ///
    /// Non-transient errors (see [`SolaceError::is_transient`]) abort
    /// immediately; the final transient error is returned unchanged.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, SolaceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SolaceError>>,
    {
        let mut delay = self.base_delay;
        let mut last_err = None;

        for attempt in 1..=self.attempts.max(1) {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        // Reachable only when attempts == 0 was clamped; keep a real error.
        Err(last_err.unwrap_or_else(|| {
            SolaceError::Configuration("retry policy produced no attempts".to_string())
        }))
    }
}
