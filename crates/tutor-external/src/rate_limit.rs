use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket: refills continuously at `rate` tokens per second up to a
/// capacity of `rate`. The lock is held across the wait so concurrent
/// callers are served strictly one after another.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `calls_per_second` must be positive; configuration validation
    /// rejects anything else.
    pub fn new(calls_per_second: f64) -> Self {
        let rate = if calls_per_second.is_finite() && calls_per_second > 0.0 { calls_per_second } else { 1.0 };
        Self { rate, bucket: Mutex::new(Bucket { tokens: rate, last_refill: Instant::now() }) }
    }

    pub fn rate(&self) -> f64 { self.rate }

    /// Waits until a token is available, then consumes it.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.rate);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return;
        }

        let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate);
        debug!(wait_ms = wait.as_millis() as u64, "rate limited");
        sleep(wait).await;
        // The token that accrued during the wait is the one being spent.
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_is_immediate() {
        let limiter = RateLimiter::new(3.0);
        let start = Instant::now();
        for _ in 0..3 { limiter.acquire().await; }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_is_bounded() {
        let rate = 2.0;
        let limiter = RateLimiter::new(rate);
        let start = Instant::now();
        for _ in 0..6 { limiter.acquire().await; }
        assert!(start.elapsed() >= Duration::from_secs_f64(2.0 / rate), "{:?}", start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn fractional_rate_waits_every_call() {
        let limiter = RateLimiter::new(0.5);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        // 0.5 tokens at start: first call waits 1s, second waits the full 2s
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
