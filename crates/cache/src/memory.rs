use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use agw_domain::Result;

use crate::Cache;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// In-process cache with lazy TTL eviction.
///
/// Expired entries are dropped on read; a full sweep runs whenever the
/// map grows past a threshold, so an idle key cannot pin memory forever.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

const SWEEP_THRESHOLD: usize = 10_000;

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn sweep_if_large(entries: &mut HashMap<String, Entry>, now: Instant) {
        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, e| !e.is_expired(now));
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Self::sweep_if_large(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|t| now + t),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<(u64, u64)> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        Self::sweep_if_large(&mut entries, now);

        let stale = entries.get(key).map(|e| e.is_expired(now)).unwrap_or(true);
        if stale {
            entries.insert(
                key.to_string(),
                Entry {
                    value: "1".to_string(),
                    expires_at: Some(now + ttl),
                },
            );
            return Ok((1, ttl.as_secs()));
        }

        let entry = entries.get_mut(key).expect("checked above");
        let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = count.to_string();
        let remaining = entry
            .expires_at
            .map(|at| at.saturating_duration_since(now).as_secs())
            .unwrap_or(0);
        Ok((count, remaining))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let present = entries.get(key).map(|e| !e.is_expired(now)).unwrap_or(false);
        if present {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.remove(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn incr_counts_within_one_window() {
        let cache = MemoryCache::new();
        let (c1, _) = cache.incr("n", Duration::from_secs(60)).await.unwrap();
        let (c2, remaining) = cache.incr("n", Duration::from_secs(60)).await.unwrap();
        assert_eq!((c1, c2), (1, 2));
        assert!(remaining <= 60);
    }

    #[tokio::test]
    async fn incr_restarts_after_expiry() {
        let cache = MemoryCache::new();
        cache.incr("n", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let (count, _) = cache.incr("n", Duration::from_secs(60)).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn set_if_absent_is_exclusive() {
        let cache = MemoryCache::new();
        assert!(cache
            .set_if_absent("lock", "a", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!cache
            .set_if_absent("lock", "b", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(cache.get("lock").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn take_consumes_exactly_once() {
        let cache = MemoryCache::new();
        cache
            .set("state", "xyz", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(cache.take("state").await.unwrap().as_deref(), Some("xyz"));
        assert_eq!(cache.take("state").await.unwrap(), None);
    }
}
