//! Retry policy for remote fetches
//!
//! Exponential backoff with jitter, capped, and overridable by a server
//! `Retry-After` hint.

use crate::error::{is_retryable_status, is_retryable_transport};
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// When and how long to wait before retrying a request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for computed delays
    pub max_backoff: Duration,
    /// Half-width of the uniform jitter window added to each delay
    pub jitter: Duration,
    /// Upper bound for server-supplied `Retry-After` delays
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            jitter: Duration::from_millis(100),
            max_retry_after: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Whether a response status should be retried
    pub fn should_retry_status(&self, status: u16) -> bool {
        is_retryable_status(status)
    }

    /// Whether a transport error should be retried
    ///
    /// See [`is_retryable_transport`] for the failures that qualify.
    pub fn should_retry_error(&self, error: &reqwest::Error) -> bool {
        is_retryable_transport(error)
    }

    /// Base delay for a 1-based retry attempt, before jitter and cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }

    /// Delay to wait before the given 1-based retry attempt
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_retry_after);
        }

        let base = self.backoff(attempt).as_millis() as i64;
        let jitter_ms = self.jitter.as_millis() as i64;
        let noise = if jitter_ms > 0 {
            rand::thread_rng().gen_range(-jitter_ms..=jitter_ms)
        } else {
            0
        };

        let delay = Duration::from_millis((base + noise).max(0) as u64);
        delay.min(self.max_backoff)
    }
}

/// Parse a `Retry-After` header, either delta-seconds or an HTTP date
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = at.signed_duration_since(Utc::now()).to_std().unwrap_or_default();
    Some(wait)
}
