//! Rate limiter for the gateway API
//!
//! Counts requests per key (one key per client IP) inside a decay window that
//! starts with the first hit. Once `max_attempts` hits are recorded the key is
//! limited until the window elapses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request counted; `remaining` hits left in the current window
    Allowed { remaining: u32 },
    /// Limit reached
    Limited {
        /// Whole seconds until the window resets (at least 1)
        retry_after: u64,
        /// Unix timestamp at which the window resets
        reset_at: u64,
    },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Per-key request counter
pub struct ApiRateLimiter {
    windows: Arc<RwLock<HashMap<String, Window>>>,
    max_attempts: u32,
    decay: Duration,
}

impl ApiRateLimiter {
    /// Create a new rate limiter
    pub fn new(max_attempts: u32, decay: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            decay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check the key and record the hit if it is not limited.
    ///
    /// Check and increment happen under one write lock, so concurrent
    /// requests for the same key cannot both slip under the limit.
    pub async fn hit(&self, key: &str) -> RateLimitDecision {
        let mut windows = self.windows.write().await;
        let now = Instant::now();

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });

        // Expired window starts over
        if now.duration_since(window.started) >= self.decay {
            *window = Window {
                started: now,
                hits: 0,
            };
        }

        if window.hits >= self.max_attempts {
            let remaining = self.decay.saturating_sub(now.duration_since(window.started));
            let retry_after = ceil_secs(remaining).max(1);
            return RateLimitDecision::Limited {
                retry_after,
                reset_at: unix_now() + retry_after,
            };
        }

        window.hits += 1;
        RateLimitDecision::Allowed {
            remaining: self.max_attempts - window.hits,
        }
    }

    /// Forget a key entirely
    pub async fn clear(&self, key: &str) {
        self.windows.write().await.remove(key);
    }

    /// Number of keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Clean up expired windows (should be called periodically)
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let decay = self.decay;
        let mut windows = self.windows.write().await;
        windows.retain(|_, window| now.duration_since(window.started) < decay);
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_after_max_attempts() {
        let limiter = ApiRateLimiter::new(3, Duration::from_secs(60));

        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.hit("paperless-api:127.0.0.1").await,
                RateLimitDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }

        match limiter.hit("paperless-api:127.0.0.1").await {
            RateLimitDecision::Limited { retry_after, reset_at } => {
                assert!(retry_after >= 1 && retry_after <= 60);
                assert!(reset_at >= unix_now());
            }
            other => panic!("expected limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = ApiRateLimiter::new(1, Duration::from_secs(60));

        assert!(matches!(
            limiter.hit("a").await,
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.hit("a").await,
            RateLimitDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.hit("b").await,
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_window_elapses() {
        let limiter = ApiRateLimiter::new(2, Duration::from_millis(150));

        limiter.hit("ip").await;
        limiter.hit("ip").await;
        assert!(matches!(
            limiter.hit("ip").await,
            RateLimitDecision::Limited { retry_after: 1, .. }
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            limiter.hit("ip").await,
            RateLimitDecision::Allowed { remaining: 1 }
        );
    }

    #[tokio::test]
    async fn test_cleanup_and_clear() {
        let limiter = ApiRateLimiter::new(5, Duration::from_millis(50));
        limiter.hit("old").await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        limiter.hit("fresh").await;

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 1);

        limiter.clear("fresh").await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_hits_never_exceed_limit() {
        let limiter = Arc::new(ApiRateLimiter::new(10, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.hit("shared").await }));
        }

        let mut allowed = 0;
        for handle in handles {
            if let RateLimitDecision::Allowed { .. } = handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 10);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(0)), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_secs(2)), 2);
        assert_eq!(ceil_secs(Duration::from_millis(2001)), 3);
    }
}
