//! Uniform interface over the remote key/value store used for
//! blacklists, rate counters, transient codes, and one-shot state.
//!
//! The gateway talks only to the [`Cache`] port. [`MemoryCache`] is the
//! in-process implementation selected by `cache.url = "memory://"`; a
//! networked backend plugs in behind the same trait.

pub mod blacklist;
pub mod keys;
pub mod memory;
pub mod rate;

pub use blacklist::Blacklist;
pub use memory::MemoryCache;
pub use rate::RateLimiter;

use std::time::Duration;

use agw_domain::Result;

/// Key/value port. Every call is a suspension point; implementations
/// must be safe to share across request tasks.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`, expiring after `ttl` when one is given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Increment a counter, starting it at 1 with `ttl` when absent.
    /// Returns the new count and the seconds left in the window.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<(u64, u64)>;

    /// Write only when the key is absent; `true` when the write landed.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Read and delete atomically. One-shot values (OAuth state, reset
    /// tickets) consume through this so a replay cannot observe them.
    async fn take(&self, key: &str) -> Result<Option<String>>;
}
