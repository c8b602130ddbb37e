// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with exponential backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub delay: Duration,
    /// Double the wait after every further failure.
    pub backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            backoff: true,
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt, after `attempt` (1-based) failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.backoff {
            return self.delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.delay.saturating_mul(factor)
    }
}

/// Every attempt failed.
#[derive(Debug, thiserror::Error)]
#[error("delivery failed after {attempts} attempt(s): {last}")]
pub struct DeliveryError<E> {
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Error from the final attempt.
    #[source]
    pub last: E,
}

/// Runs an async action until it succeeds or the policy is exhausted.
#[derive(Debug, Clone, Default)]
pub struct RetryingTransport {
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(policy: RetryPolicy) -> Self {
        RetryingTransport { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `action`, retrying failures with the configured delays.
    ///
    /// Returns the first success immediately. There is no wait after the
    /// final failed attempt.
    pub async fn execute<F, Fut, T, E>(&self, mut action: F) -> Result<T, DeliveryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match action().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "delivery succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %err, "delivery attempts exhausted");
                    return Err(DeliveryError {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.policy.delay_for(attempt);
                    debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failed attempt"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
