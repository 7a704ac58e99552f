use std::sync::Arc;
use std::time::Duration;

use agw_domain::config::WindowLimit;
use agw_domain::{Error, Result};

use crate::{keys, Cache};

/// Sliding-window rate limiter over the cache.
///
/// Counters are keyed `(action, principal)` and live exactly one window,
/// so rejecting is a single `incr` round trip and the retry-after hint
/// is the counter's remaining TTL.
#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn Cache>,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Count one attempt. The Nth request inside the window passes when
    /// N = limit; N+1 fails with the window's remaining seconds.
    pub async fn check(&self, action: &str, principal: &str, limit: WindowLimit) -> Result<()> {
        let key = keys::rate(action, principal);
        let (count, remaining) = self
            .cache
            .incr(&key, Duration::from_secs(limit.window_secs))
            .await?;
        if count > limit.max {
            tracing::debug!(action, principal, count, "rate limit exceeded");
            return Err(Error::RateLimited {
                retry_after_secs: remaining,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;

    #[tokio::test]
    async fn nth_passes_n_plus_one_fails() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()));
        let limit = WindowLimit { max: 3, window_secs: 60 };

        for _ in 0..3 {
            limiter.check("signin", "203.0.113.9", limit).await.unwrap();
        }
        match limiter.check("signin", "203.0.113.9", limit).await {
            Err(Error::RateLimited { retry_after_secs }) => {
                assert!(retry_after_secs <= 60);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn principals_do_not_share_windows() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()));
        let limit = WindowLimit { max: 1, window_secs: 60 };

        limiter.check("signin", "198.51.100.1", limit).await.unwrap();
        limiter.check("signin", "198.51.100.2", limit).await.unwrap();
        assert!(limiter.check("signin", "198.51.100.1", limit).await.is_err());
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let limiter = RateLimiter::new(Arc::new(MemoryCache::new()));
        let limit = WindowLimit { max: 1, window_secs: 0 };

        // Zero-length window: the counter is already stale on the next
        // attempt, so nothing ever accumulates.
        limiter.check("signup", "p", limit).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.check("signup", "p", limit).await.unwrap();
    }
}
