//! The maintenance-mode switch.
//!
//! Lives in the cache (`state:maintenance`) so the textual and RPC
//! transports — and any future replicas sharing the cache — observe the
//! same switch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use agw_cache::{keys, Cache};
use agw_domain::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    pub enabled: bool,
    #[serde(default)]
    pub message: String,
}

impl Default for MaintenanceStatus {
    fn default() -> Self {
        Self {
            enabled: false,
            message: String::new(),
        }
    }
}

#[derive(Clone)]
pub struct Maintenance {
    cache: Arc<dyn Cache>,
}

impl Maintenance {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn status(&self) -> MaintenanceStatus {
        match self.cache.get(keys::MAINTENANCE).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            // Cache trouble must not lock everyone out.
            _ => MaintenanceStatus::default(),
        }
    }

    pub async fn set(&self, enabled: bool, message: &str) -> Result<()> {
        let status = MaintenanceStatus {
            enabled,
            message: message.to_string(),
        };
        self.cache
            .set(keys::MAINTENANCE, &serde_json::to_string(&status)?, None)
            .await?;
        tracing::info!(enabled, "maintenance mode updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_cache::MemoryCache;

    #[tokio::test]
    async fn toggling_round_trips() {
        let maintenance = Maintenance::new(Arc::new(MemoryCache::new()));
        assert!(!maintenance.status().await.enabled);

        maintenance.set(true, "back soon").await.unwrap();
        let status = maintenance.status().await;
        assert!(status.enabled);
        assert_eq!(status.message, "back soon");

        maintenance.set(false, "").await.unwrap();
        assert!(!maintenance.status().await.enabled);
    }
}
