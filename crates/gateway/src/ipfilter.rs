//! In-process snapshot of the IP filter ruleset.
//!
//! The ruleset is consulted on every request, before rate limiting, so
//! it lives behind a read-mostly snapshot that admin mutations refresh.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use agw_domain::model::{evaluate_rules, IpRule, IpRuleKind};
use agw_domain::{Error, Result};
use agw_store::IpRuleStore;

pub struct IpFilterCache {
    store: Arc<dyn IpRuleStore>,
    snapshot: RwLock<Arc<Vec<IpRule>>>,
}

impl IpFilterCache {
    pub async fn load(store: Arc<dyn IpRuleStore>) -> Result<Self> {
        let cache = Self {
            store,
            snapshot: RwLock::new(Arc::new(Vec::new())),
        };
        cache.reload().await?;
        Ok(cache)
    }

    pub async fn reload(&self) -> Result<()> {
        let rules = self.store.list().await?;
        *self.snapshot.write() = Arc::new(rules);
        Ok(())
    }

    /// Deny wins; with any allow rules present, unlisted addresses are
    /// rejected; an empty ruleset accepts everything.
    pub fn permits(&self, ip: IpAddr) -> bool {
        evaluate_rules(&self.snapshot.read().clone(), ip)
    }

    pub fn rules(&self) -> Arc<Vec<IpRule>> {
        self.snapshot.read().clone()
    }

    pub async fn add_rule(&self, cidr: &str, kind: IpRuleKind, description: &str) -> Result<IpRule> {
        let rule = IpRule {
            id: Uuid::new_v4(),
            cidr: cidr.to_string(),
            kind,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        if rule.network().is_none() {
            return Err(Error::Validation(format!("'{cidr}' is not a CIDR or address")));
        }
        self.store.insert(rule.clone()).await?;
        self.reload().await?;
        Ok(rule)
    }

    pub async fn delete_rule(&self, id: Uuid) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(Error::NotFound("ip rule".into()));
        }
        self.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_store::MemoryStore;

    #[tokio::test]
    async fn mutations_refresh_the_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let cache = IpFilterCache::load(store).await.unwrap();
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        assert!(cache.permits(ip));

        let rule = cache
            .add_rule("203.0.113.0/24", IpRuleKind::Deny, "abuse block")
            .await
            .unwrap();
        assert!(!cache.permits(ip));

        cache.delete_rule(rule.id).await.unwrap();
        assert!(cache.permits(ip));
    }

    #[tokio::test]
    async fn invalid_cidr_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let cache = IpFilterCache::load(store).await.unwrap();
        assert!(cache.add_rule("not-a-cidr", IpRuleKind::Deny, "").await.is_err());
    }
}
