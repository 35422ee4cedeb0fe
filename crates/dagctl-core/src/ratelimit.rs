//! Per-tool rate limiting shared across concurrently running tasks.
//!
//! A process-wide, keyed token bucket. Adapted from
//! `tooling::rate_limit::RateLimiter`, generalized from a single bucket
//! to a `dashmap`-backed registry keyed by full tool id, so each tool
//! gets fair-queue semantics independent of the others.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_period: Duration,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: usize, period: Duration) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_period: period,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        if elapsed >= self.refill_period {
            self.tokens = self.capacity;
        } else {
            let ratio = elapsed.as_secs_f64() / self.refill_period.as_secs_f64();
            self.tokens = (self.tokens + self.capacity * ratio).min(self.capacity);
        }
        self.last_refill = now;
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Keyed token-bucket rate limiter. Default bucket: 10
/// requests / 1000ms.
#[derive(Clone)]
pub struct KeyedRateLimiter {
    default_capacity: usize,
    default_period: Duration,
    buckets: Arc<DashMap<String, Arc<Mutex<Bucket>>>>,
}

impl KeyedRateLimiter {
    pub fn new(default_capacity: usize, default_period: Duration) -> Self {
        Self {
            default_capacity,
            default_period,
            buckets: Arc::new(DashMap::new()),
        }
    }

    fn bucket_for(&self, key: &str) -> Arc<Mutex<Bucket>> {
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(self.default_capacity, self.default_period))))
            .clone()
    }

    /// Blocks until a slot is available for `key`, polling at a fixed
    /// short interval. Fair across keys because each key owns its own
    /// bucket and mutex.
    pub async fn acquire(&self, key: &str) {
        let bucket = self.bucket_for(key);
        loop {
            {
                let mut guard = bucket.lock().await;
                if guard.try_take() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn separate_keys_have_independent_budgets() {
        let limiter = KeyedRateLimiter::new(1, Duration::from_secs(60));
        limiter.acquire("tool_a").await;
        // tool_b has its own bucket; this must not block indefinitely.
        tokio::time::timeout(Duration::from_millis(200), limiter.acquire("tool_b"))
            .await
            .expect("tool_b acquire should not be blocked by tool_a's exhausted bucket");
    }

    #[tokio::test]
    async fn exhausted_bucket_refills_over_time() {
        let limiter = KeyedRateLimiter::new(1, Duration::from_millis(50));
        limiter.acquire("tool_a").await;
        tokio::time::timeout(Duration::from_millis(500), limiter.acquire("tool_a"))
            .await
            .expect("bucket should refill within the period");
    }
}
