use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default rate limits (requests per second).
pub mod rate_limits {
    /// The store allows 5 requests per second per base.
    pub const STORE_DEFAULT_RPS: u32 = 5;
}

/// A proactive API rate limiter using the governor crate.
///
/// This sits in front of every request a [`StoreClient`](crate::StoreClient)
/// makes when configured. It complements, and does not replace, the fixed
/// inter-request delay that multi-request operations observe.
///
/// # Example
///
/// ```ignore
/// use tabsync::rate_limit::{ApiRateLimiter, rate_limits};
///
/// let limiter = ApiRateLimiter::new(rate_limits::STORE_DEFAULT_RPS);
///
/// // Before each API call:
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
    requests_per_second: u32,
}

impl ApiRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A value of 0 is treated as 1.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
            requests_per_second: rps.get(),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }

    /// Configured requests per second.
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rps_is_clamped_to_one() {
        assert_eq!(ApiRateLimiter::new(0).requests_per_second(), 1);
        assert_eq!(
            ApiRateLimiter::new(rate_limits::STORE_DEFAULT_RPS).requests_per_second(),
            5
        );
    }

    #[tokio::test]
    async fn test_wait_allows_first_request_immediately() {
        let limiter = ApiRateLimiter::new(5);
        tokio::time::timeout(std::time::Duration::from_secs(1), limiter.wait())
            .await
            .expect("first request should not be throttled");
    }

    #[test]
    fn test_limiter_clones_share_state() {
        let limiter = ApiRateLimiter::new(1);
        let clone = limiter.clone();
        assert!(Arc::ptr_eq(&limiter.inner, &clone.inner));
    }
}
