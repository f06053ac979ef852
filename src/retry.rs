//! Retry policy for failed sends.
//!
//! A [`RetryPolicy`] classifies which outcomes are worth another attempt
//! (transport faults, timeouts, retryable statuses) and how long to wait
//! between attempts. The dispatcher applies it inside the request's
//! overall timeout window, so retries never extend the configured
//! deadline.

use crate::error::Error;
use http::StatusCode;
use std::time::Duration;

/// How the inter-attempt delay grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Constant delay between attempts.
    Fixed,
    /// Delay doubles each attempt (`base * 2^attempt`).
    Exponential,
    /// Delay grows linearly (`base * (attempt + 1)`).
    Linear,
}

/// Retry configuration attached to a request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay growth strategy.
    pub strategy: BackoffStrategy,
    /// Base delay for the first retry.
    pub base_delay: Duration,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
    /// Retry transport-level faults.
    pub retry_on_network_error: bool,
    /// Retry per-attempt timeouts.
    pub retry_on_timeout: bool,
    /// Retry `5xx` responses.
    pub retry_on_server_error: bool,
    /// Retry `408 Request Timeout` and `429 Too Many Requests`.
    pub retry_on_rate_limit: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            retry_on_network_error: true,
            retry_on_timeout: true,
            retry_on_server_error: true,
            retry_on_rate_limit: true,
        }
    }
}

impl RetryPolicy {
    /// A cautious preset: two fixed-delay retries, network faults only.
    pub fn conservative() -> Self {
        Self {
            max_retries: 2,
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            retry_on_network_error: true,
            retry_on_timeout: false,
            retry_on_server_error: false,
            retry_on_rate_limit: true,
        }
    }

    /// Whether another attempt may follow the given error.
    pub fn should_retry_error(&self, error: &Error, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        match error.root_cause() {
            Error::Network(_) => self.retry_on_network_error,
            Error::Timeout { .. } => self.retry_on_timeout,
            _ => false,
        }
    }

    /// Whether another attempt may follow a response with this status.
    pub fn should_retry_status(&self, status: StatusCode, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        if status.is_server_error() {
            return self.retry_on_server_error;
        }
        matches!(status.as_u16(), 408 | 429) && self.retry_on_rate_limit
    }

    /// Delay before the retry numbered `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt.min(16));
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt + 1),
        };
        delay.min(self.max_delay)
    }
}
