// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded retry with linear backoff.
//!
//! The delay before retry `n` is `base_delay * n`. This is the only place in
//! the data layer that sleeps on purpose.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{messages, AppError};
use crate::network::call::execute;
use crate::network::transport::TransportError;
use crate::outcome::Outcome;

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after the `attempt`-th failure.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Runs `operation` through [`execute`], retrying retryable errors.
///
/// Returns on the first success, on the first error `should_retry` rejects,
/// or with the last error once `max_attempts` is exhausted.
pub async fn execute_with_retry<T, F, Fut, P>(
    policy: RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Outcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
    P: Fn(&AppError) -> bool,
{
    let mut attempt: u32 = 0;
    let mut last_error: Option<AppError> = None;

    while attempt < policy.max_attempts {
        match execute(&mut operation).await {
            Outcome::Success(value) => return Outcome::Success(value),
            Outcome::Error(err) => {
                if !should_retry(&err) {
                    return Outcome::Error(err);
                }
                attempt += 1;
                if attempt < policy.max_attempts {
                    let delay = policy.delay_for(attempt);
                    debug!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after retryable error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(err);
            }
            // `execute` never yields Loading; count it so the loop stays bounded.
            Outcome::Loading => attempt += 1,
        }
    }

    Outcome::Error(last_error.unwrap_or_else(|| AppError::unknown(messages::MAX_RETRIES_EXCEEDED)))
}

/// [`execute_with_retry`] using [`AppError::is_retryable`] as the predicate.
pub async fn execute_retrying<T, F, Fut>(policy: RetryPolicy, operation: F) -> Outcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    execute_with_retry(policy, AppError::is_retryable, operation).await
}
