use std::sync::Arc;
use std::time::Duration;

use agw_domain::Result;

use crate::{keys, Cache};

/// Cache-resident set of revoked credential digests.
///
/// Entries carry the revoked credential's remaining lifetime as TTL, so
/// the set self-prunes and can never outgrow the population of live
/// tokens.
#[derive(Clone)]
pub struct Blacklist {
    cache: Arc<dyn Cache>,
}

impl Blacklist {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Revoke a credential digest until its natural expiry.
    pub async fn revoke(&self, digest: &str, remaining: Duration) -> Result<()> {
        if remaining.is_zero() {
            // Already past exp; nothing to remember.
            return Ok(());
        }
        self.cache
            .set(&keys::blacklist(digest), "1", Some(remaining))
            .await
    }

    pub async fn contains(&self, digest: &str) -> Result<bool> {
        self.cache.exists(&keys::blacklist(digest)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;

    #[tokio::test]
    async fn revoked_digest_is_listed_until_expiry() {
        let blacklist = Blacklist::new(Arc::new(MemoryCache::new()));
        blacklist
            .revoke("digest-a", Duration::from_millis(40))
            .await
            .unwrap();
        assert!(blacklist.contains("digest-a").await.unwrap());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!blacklist.contains("digest-a").await.unwrap());
    }

    #[tokio::test]
    async fn zero_remaining_is_a_noop() {
        let blacklist = Blacklist::new(Arc::new(MemoryCache::new()));
        blacklist.revoke("digest-b", Duration::ZERO).await.unwrap();
        assert!(!blacklist.contains("digest-b").await.unwrap());
    }
}
