//! Per-provider request pacing
//!
//! Enforces a minimum spacing between requests plus an optional cap on requests
//! per rolling window. The equity provider's free tier allows 5 requests per
//! minute, which works out to one request every 15 seconds.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Window used for the per-window request cap
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Pacing policy for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
    /// Minimum time between the start of two requests
    pub min_spacing: Duration,
    /// Maximum requests per `RATE_WINDOW`
    pub max_per_window: Option<u32>,
}

impl RatePolicy {
    pub fn spacing(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            max_per_window: None,
        }
    }

    /// Policy for a "N requests per minute" quota
    pub fn per_minute(max_requests: u32) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            min_spacing: RATE_WINDOW / max_requests,
            max_per_window: Some(max_requests),
        }
    }
}

/// Rate limiter for a single provider
#[derive(Debug)]
pub struct RateLimiter {
    policy: RatePolicy,
    /// Start of the last request, if any
    last_request: Option<Instant>,
    /// Requests made in current window
    requests_in_window: u32,
    /// Window start time
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            policy,
            last_request: None,
            requests_in_window: 0,
            window_start: Instant::now(),
        }
    }

    /// How long to wait before a request may start, if at all
    pub fn check_rate_limit(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = now.duration_since(self.window_start);

        if elapsed >= RATE_WINDOW {
            self.window_start = now;
            self.requests_in_window = 0;
        }

        if let Some(max) = self.policy.max_per_window {
            if self.requests_in_window >= max {
                let wait = RATE_WINDOW.saturating_sub(now.duration_since(self.window_start));
                if !wait.is_zero() {
                    return Some(wait);
                }
            }
        }

        if let Some(last) = self.last_request {
            let since_last = now.duration_since(last);
            if since_last < self.policy.min_spacing {
                return Some(self.policy.min_spacing - since_last);
            }
        }

        None
    }

    /// Record that a request was made
    pub fn record_request(&mut self, now: Instant) {
        self.last_request = Some(now);
        self.requests_in_window += 1;
    }

    /// Sleep until a request may start, then record it
    pub async fn wait_if_needed(&mut self) -> Duration {
        let mut waited = Duration::ZERO;
        while let Some(wait) = self.check_rate_limit(Instant::now()) {
            tracing::debug!("rate limiter: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
            waited += wait;
        }
        self.record_request(Instant::now());
        waited
    }
}
