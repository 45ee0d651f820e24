use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// Token-bucket limiter in front of the quote API. Unauthenticated quote
/// endpoints throttle aggressively, so every request goes through `acquire`.
pub struct QuoteRateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl QuoteRateLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let per_second =
            NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(1).unwrap());
        let burst = NonZeroU32::new(burst_size).unwrap_or(per_second);

        let quota = Quota::per_second(per_second).allow_burst(burst);
        let limiter = GovernorRateLimiter::direct(quota);

        Self { limiter }
    }

    /// Wait until a request can be made.
    pub async fn acquire(&self) {
        while self.limiter.check().is_err() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Try to acquire a token without blocking.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limiter_allows_burst() {
        let limiter = QuoteRateLimiter::new(10, 5);

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
    }

    #[tokio::test]
    async fn test_limiter_blocks_after_burst() {
        let limiter = QuoteRateLimiter::new(10, 2);

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_limiter_zero_rate_falls_back_to_one() {
        let limiter = QuoteRateLimiter::new(0, 0);
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_limiter_acquire_waits() {
        let limiter = QuoteRateLimiter::new(10, 1);

        limiter.acquire().await;

        let start = std::time::Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();

        // Second acquire had to wait for a token refill
        assert!(elapsed.as_millis() > 50);
    }
}
