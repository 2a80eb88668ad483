//! Client-side request spacing for rate-limited upstream APIs.
//!
//! Each provider client owns one `RequestSpacer`. Clones of the client share
//! it through `Arc`, so the spacing holds across concurrent requests to the
//! same client instance without any process-wide state.

use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Enforces a minimum interval between consecutive upstream calls.
pub struct RequestSpacer {
    limiter: Option<DefaultDirectRateLimiter>,
    min_interval: Duration,
}

impl RequestSpacer {
    /// A zero interval disables spacing entirely.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(RateLimiter::direct);

        Self {
            limiter,
            min_interval,
        }
    }

    /// Wait until the next request is allowed to go out.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RequestSpacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSpacer")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}
