//! Retry with exponential backoff for backend calls.
//!
//! Every remote Table API call is wrapped in [`with_retry`], which retries on
//! any error with a doubling delay between attempts. There is no jitter and no
//! circuit breaker: a persistently failing backend is retried in full on every
//! request.

use std::future::Future;
use std::time::Duration;

use crate::error::CourierError;

/// Base delay before the first retry.
const BASE_DELAY_MS: u64 = 500;

/// Backoff policy for a single operation.
///
/// `max_attempts` is the number of retries after the initial attempt, so an
/// operation runs at most `max_attempts + 1` times.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles after each subsequent failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given retry count and the default base delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }

    /// Returns the delay to sleep before retry number `attempt` (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Executes an operation, retrying on any error with exponential backoff.
///
/// On failure the helper sleeps `base_delay * 2^(attempt-1)` and tries again,
/// up to `policy.max_attempts` additional tries. Once retries are exhausted
/// the last error propagates to the caller. Sleeps use `tokio::time::sleep`
/// and never block other in-flight requests.
///
/// # Arguments
///
/// * `policy` - Attempt count and base delay
/// * `operation` - Name used in retry log lines
/// * `f` - Closure producing the future to retry
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    f: F,
) -> Result<T, CourierError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CourierError>>,
{
    let mut attempt = 0u32;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt > policy.max_attempts {
                    if policy.max_attempts > 0 {
                        tracing::debug!(
                            operation = operation,
                            attempts = attempt,
                            "All retry attempts exhausted"
                        );
                    }
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation,
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Backend call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
