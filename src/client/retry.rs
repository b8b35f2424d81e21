//! Retry policy for transport failures.

use std::time::Duration;

use http::Method;

/// Exponential backoff between `min_timeout` and `max_timeout`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 4,
            min_timeout: Duration::from_millis(100),
            max_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.min_timeout
            .saturating_mul(factor)
            .min(self.max_timeout)
            .max(self.min_timeout.min(self.max_timeout))
    }

    /// Whether another attempt is allowed after `attempt` failures.
    #[inline]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.retries
    }
}

/// Transport failures worth another attempt.
///
/// A failed connect never reached the server. A timeout may have, so it is
/// only retried for idempotent methods.
pub(crate) fn is_retryable(err: &reqwest::Error, method: &Method) -> bool {
    err.is_connect() || (err.is_timeout() && method.is_idempotent())
}
