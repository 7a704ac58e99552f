use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use agw_domain::model::{DeviceDescriptor, Page, PageRequest, Session};
use agw_domain::{Error, Result};
use agw_store::SessionStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Live-session statistics for the admin view.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_live: u64,
    pub by_device_kind: Vec<(String, u64)>,
    /// Top 10 operating systems by live-session count.
    pub top_os: Vec<(String, u64)>,
    /// Top 10 browsers by live-session count.
    pub top_browsers: Vec<(String, u64)>,
}

/// Refresh-session lifecycle over the session-store port.
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    /// How long revoked rows are kept for audit before GC removes them.
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, retention_days: u32) -> Self {
        Self {
            store,
            retention: Duration::days(retention_days as i64),
        }
    }

    /// Create a session, atomically rotating `rotate_from` when given.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        actor_id: Uuid,
        device: DeviceDescriptor,
        ip: Option<String>,
        user_agent: Option<String>,
        refresh_digest: String,
        expires_at: DateTime<Utc>,
        rotate_from: Option<Uuid>,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            actor_id,
            refresh_digest,
            device,
            ip,
            user_agent,
            label: None,
            last_active_at: now,
            expires_at,
            created_at: now,
            revoked_at: None,
        };

        match rotate_from {
            Some(old_id) => self.store.rotate(old_id, session.clone()).await?,
            None => self.store.insert(session.clone()).await?,
        }
        tracing::debug!(
            session_id = %session.id,
            actor_id = %actor_id,
            rotated = rotate_from.is_some(),
            "session created"
        );
        Ok(session)
    }

    /// The session behind a refresh digest, iff live.
    pub async fn find_live(&self, refresh_digest: &str) -> Result<Option<Session>> {
        self.store.find_live_by_digest(refresh_digest, Utc::now()).await
    }

    /// The session behind a refresh digest, revoked rows included.
    /// Reuse detection distinguishes "never seen" from "seen and retired".
    pub async fn find_any(&self, refresh_digest: &str) -> Result<Option<Session>> {
        self.store.find_by_digest(refresh_digest).await
    }

    /// Best-effort activity bump; failures are logged, never surfaced.
    pub async fn touch(&self, id: Uuid) {
        if let Err(e) = self.store.touch(id, Utc::now()).await {
            tracing::warn!(session_id = %id, error = %e, "session touch failed");
        }
    }

    pub async fn rename(&self, id: Uuid, actor_id: Uuid, label: &str) -> Result<()> {
        if self.store.rename(id, actor_id, label).await? {
            Ok(())
        } else {
            Err(Error::NotFound("session".into()))
        }
    }

    /// Revoke one session. Not-found covers both a missing row and one
    /// already revoked.
    pub async fn revoke(&self, id: Uuid) -> Result<()> {
        if self.store.revoke(id, Utc::now()).await? {
            tracing::info!(session_id = %id, "session revoked");
            Ok(())
        } else {
            Err(Error::NotFound("session".into()))
        }
    }

    /// Bulk revocation, sparing at most one session (the one performing
    /// a password change).
    pub async fn revoke_all_except(&self, actor_id: Uuid, except: Option<Uuid>) -> Result<usize> {
        let revoked = self
            .store
            .revoke_all_for_actor(actor_id, except, Utc::now())
            .await?;
        if revoked > 0 {
            tracing::info!(actor_id = %actor_id, revoked, "bulk session revocation");
        }
        Ok(revoked)
    }

    pub async fn list_for_actor(
        &self,
        actor_id: Uuid,
        live_only: bool,
        page: PageRequest,
    ) -> Result<Page<Session>> {
        self.store
            .list_for_actor(actor_id, live_only, Utc::now(), page)
            .await
    }

    pub async fn list_all(&self, page: PageRequest) -> Result<Page<Session>> {
        self.store.list_all(page).await
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        let live = self.store.live_sessions(Utc::now()).await?;

        let mut by_kind: HashMap<String, u64> = HashMap::new();
        let mut by_os: HashMap<String, u64> = HashMap::new();
        let mut by_browser: HashMap<String, u64> = HashMap::new();
        for session in &live {
            *by_kind.entry(session.device.kind.as_str().to_string()).or_default() += 1;
            if !session.device.os.is_empty() {
                *by_os.entry(session.device.os.clone()).or_default() += 1;
            }
            if !session.device.browser.is_empty() {
                *by_browser.entry(session.device.browser.clone()).or_default() += 1;
            }
        }

        Ok(SessionStats {
            total_live: live.len() as u64,
            by_device_kind: top_n(by_kind, usize::MAX),
            top_os: top_n(by_os, 10),
            top_browsers: top_n(by_browser, 10),
        })
    }

    /// Remove expired rows and revoked rows past retention.
    pub async fn gc(&self) -> Result<usize> {
        let removed = self.store.gc(Utc::now(), self.retention).await?;
        if removed > 0 {
            tracing::info!(removed, "session GC");
        }
        Ok(removed)
    }
}

fn top_n(counts: HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_domain::model::DeviceKind;
    use agw_store::MemoryStore;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryStore::new()), 30)
    }

    async fn create(reg: &SessionRegistry, actor: Uuid, digest: &str) -> Session {
        reg.create(
            actor,
            DeviceDescriptor {
                kind: DeviceKind::Desktop,
                os: "Linux".into(),
                browser: "Firefox".into(),
            },
            Some("203.0.113.9".into()),
            Some("test-agent".into()),
            digest.to_string(),
            Utc::now() + Duration::days(30),
            None,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_find_live() {
        let reg = registry();
        let actor = Uuid::new_v4();
        let session = create(&reg, actor, "digest-1").await;

        let found = reg.find_live("digest-1").await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert!(reg.find_live("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotation_retires_the_predecessor() {
        let reg = registry();
        let actor = Uuid::new_v4();
        let first = create(&reg, actor, "digest-1").await;

        let second = reg
            .create(
                actor,
                first.device.clone(),
                first.ip.clone(),
                first.user_agent.clone(),
                "digest-2".into(),
                Utc::now() + Duration::days(30),
                Some(first.id),
            )
            .await
            .unwrap();

        assert!(reg.find_live("digest-1").await.unwrap().is_none());
        // The retired row is still visible to reuse detection.
        let retired = reg.find_any("digest-1").await.unwrap().unwrap();
        assert!(retired.revoked_at.is_some());
        assert_eq!(reg.find_live("digest-2").await.unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn revoke_is_not_found_the_second_time() {
        let reg = registry();
        let actor = Uuid::new_v4();
        let session = create(&reg, actor, "digest-1").await;

        reg.revoke(session.id).await.unwrap();
        assert!(matches!(
            reg.revoke(session.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stats_bucket_by_device() {
        let reg = registry();
        let actor = Uuid::new_v4();
        create(&reg, actor, "d1").await;
        create(&reg, actor, "d2").await;

        let stats = reg.stats().await.unwrap();
        assert_eq!(stats.total_live, 2);
        assert_eq!(stats.by_device_kind, vec![("desktop".to_string(), 2)]);
        assert_eq!(stats.top_os, vec![("Linux".to_string(), 2)]);
        assert_eq!(stats.top_browsers, vec![("Firefox".to_string(), 2)]);
    }

    #[tokio::test]
    async fn touch_bumps_last_activity() {
        let reg = registry();
        let actor = Uuid::new_v4();
        let session = create(&reg, actor, "d1").await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        reg.touch(session.id).await;

        let page = reg
            .list_for_actor(actor, true, PageRequest::default())
            .await
            .unwrap();
        assert!(page.items[0].last_active_at > session.last_active_at);

        // Touching a missing session is silent by contract.
        reg.touch(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn list_live_only_hides_revoked() {
        let reg = registry();
        let actor = Uuid::new_v4();
        let session = create(&reg, actor, "d1").await;
        create(&reg, actor, "d2").await;
        reg.revoke(session.id).await.unwrap();

        let live = reg
            .list_for_actor(actor, true, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(live.total, 1);
        let all = reg
            .list_for_actor(actor, false, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
    }
}
