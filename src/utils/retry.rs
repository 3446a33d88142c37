//! Bounded exponential backoff for transient gallery failures.
//!
//! The gallery client never retries on its own. Callers one layer up (the
//! resolver and the search service) wrap each call in [`with_retry`] so that
//! every concurrent lookup follows the same policy. Only errors for which
//! [`PackageError::is_retryable`] holds are retried; everything else is
//! returned from the first attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::core::{PackageError, Result};
use crate::diagnostics::Diagnostics;

/// How often and how patiently to retry `Unavailable` failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds. Doubles per attempt.
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delays between attempts: `initial`, `2 * initial`, `4 * initial`, ...
    /// capped at `max_delay_ms`, with jitter.
    fn strategy(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff yields base^n * factor; base 2 gives doubling.
        let factor = (self.initial_delay_ms / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Run `action` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted.
///
/// Each retry is reported on the diagnostics sink at `warning` level.
///
/// # Errors
///
/// Returns the last error produced by `action`.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    diagnostics: &dyn Diagnostics,
    operation: &str,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    RetryIf::start(
        policy.strategy(),
        || {
            attempt += 1;
            if attempt > 1 {
                diagnostics.warning(&format!("retrying {operation} (attempt {attempt})"));
            }
            action()
        },
        PackageError::is_retryable,
    )
    .await
}
