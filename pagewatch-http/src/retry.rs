//! When to try again, and how long to wait first.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

const BASE_DELAY_MS: u64 = 200;
/// Rate limits without `Retry-After` wait at least this long.
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(1100);

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    max_retries: usize,
}

impl RetryPolicy {
    pub(crate) fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub(crate) fn after_network_error(&self, attempt: usize) -> Option<Duration> {
        self.has_budget(attempt).then(|| backoff(attempt))
    }

    /// Only 429 and 5xx are retried; `Retry-After` (seconds) wins over backoff.
    pub(crate) fn after_status(
        &self,
        attempt: usize,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Option<Duration> {
        let limited = status == StatusCode::TOO_MANY_REQUESTS;
        if !(limited || status.is_server_error()) || !self.has_budget(attempt) {
            return None;
        }
        Some(match retry_after(headers) {
            Some(wait) => wait,
            None if limited => backoff(attempt).max(RATE_LIMIT_FLOOR),
            None => backoff(attempt),
        })
    }

    fn has_budget(&self, attempt: usize) -> bool {
        attempt <= self.max_retries
    }
}

fn backoff(attempt: usize) -> Duration {
    let exp = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.pow(exp)))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}
