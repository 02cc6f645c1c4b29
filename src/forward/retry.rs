use std::time::Duration;

use reqwest::StatusCode;

/// Bounded retry with exponential backoff.
///
/// `max_attempts` counts every request including the first one. The delay
/// after failed attempt `n` (zero based) is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
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

    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

/// What a sink response status means for the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 200: delivered.
    Delivered,
    /// 4xx: retried like a transport failure.
    Retryable,
    /// Anything else: logged, not retried.
    Terminal,
}

impl StatusClass {
    pub fn of(status: StatusCode) -> Self {
        if status == StatusCode::OK {
            Self::Delivered
        } else if status.is_client_error() {
            Self::Retryable
        } else {
            Self::Terminal
        }
    }
}
