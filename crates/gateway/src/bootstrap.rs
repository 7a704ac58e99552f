//! AppState construction and background-task spawning shared by the
//! server and the CLI.

use std::sync::Arc;

use anyhow::Context;

use agw_authz::AuthzEngine;
use agw_cache::{Blacklist, Cache, MemoryCache, RateLimiter};
use agw_credentials::{PasswordHasher, TokenService};
use agw_domain::config::Config;
use agw_domain::model::{ActorKind, NewActor, ADMIN_ROLE};
use agw_providers::ProviderRegistry;
use agw_sessions::SessionRegistry;
use agw_store::{ActorStore, MemoryStore, OtpStore as _, RoleStore, SessionStore};

use crate::audit::{self, AuditHandle};
use crate::ipfilter::IpFilterCache;
use crate::maintenance::Maintenance;
use crate::state::AppState;

/// Initialize every subsystem and return a fully-wired [`AppState`].
pub async fn build_app_state(
    config: Arc<Config>,
    shutdown: Arc<tokio::sync::Notify>,
) -> anyhow::Result<AppState> {
    // ── Cache ────────────────────────────────────────────────────────
    // `memory://` is the in-process cache; a networked cache client
    // plugs in behind the same trait.
    if !config.cache.url.starts_with("memory://") {
        tracing::warn!(
            url = %config.cache.url,
            "networked cache backend not wired in this build, using the in-process cache"
        );
    }
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let blacklist = Blacklist::new(cache.clone());
    let limiter = RateLimiter::new(cache.clone());
    tracing::info!("cache client ready");

    // ── Identity store ───────────────────────────────────────────────
    let store = Arc::new(MemoryStore::new());
    tracing::info!(
        db_host = %config.database.host,
        max_open = config.database.max_open_conns,
        "identity store ready"
    );

    // ── Credentials ──────────────────────────────────────────────────
    let tokens = Arc::new(TokenService::from_config(&config.tokens));
    let hasher = PasswordHasher::new(config.auth.kdf).context("initializing password hasher")?;
    tracing::info!(
        access_ttl_secs = config.tokens.access_ttl_secs,
        kdf_memory_kib = config.auth.kdf.memory_kib,
        "credential primitives ready"
    );

    // ── Authorization engine ─────────────────────────────────────────
    let authz = Arc::new(
        AuthzEngine::load(store.clone(), store.clone())
            .await
            .context("loading authorization matrix")?,
    );
    authz
        .ensure_defaults()
        .await
        .context("seeding system roles")?;
    tracing::info!("authorization engine ready");

    // ── Session registry ─────────────────────────────────────────────
    let sessions = Arc::new(SessionRegistry::new(
        store.clone() as Arc<dyn SessionStore>,
        config.auth.session_retention_days,
    ));
    tracing::info!(
        retention_days = config.auth.session_retention_days,
        "session registry ready"
    );

    // ── Outbound providers ───────────────────────────────────────────
    let providers = Arc::new(
        ProviderRegistry::from_config(&config.providers)
            .context("initializing outbound providers")?,
    );

    // ── IP filter snapshot ───────────────────────────────────────────
    let ip_filter = Arc::new(
        IpFilterCache::load(store.clone())
            .await
            .context("loading IP filter rules")?,
    );
    tracing::info!(rules = ip_filter.rules().len(), "IP filter ready");

    // ── Audit pipeline ───────────────────────────────────────────────
    let audit = AuditHandle::new();
    tracing::info!("audit pipeline ready");

    let maintenance = Maintenance::new(cache.clone());
    let state = AppState {
        config: config.clone(),
        actors: store.clone(),
        roles: store.clone(),
        api_keys: store.clone(),
        otps: store.clone(),
        backup_codes: store.clone(),
        ip_rules: store.clone(),
        audit_store: store.clone(),
        tokens,
        hasher,
        authz,
        sessions,
        cache,
        blacklist,
        limiter,
        ip_filter,
        maintenance,
        providers,
        audit,
        shutdown,
    };

    bootstrap_admin(&state).await?;
    Ok(state)
}

/// Create the bootstrap admin on an empty store when the operator
/// supplied credentials for it.
async fn bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    let password = match std::env::var("AGW_BOOTSTRAP_ADMIN_PASSWORD") {
        Ok(password) if !password.is_empty() => password,
        _ => return Ok(()),
    };
    let existing = state
        .actors
        .list(agw_domain::model::PageRequest { page: 1, per_page: 1 })
        .await
        .map_err(|e| anyhow::anyhow!("listing actors: {e}"))?;
    if existing.total > 0 {
        return Ok(());
    }

    let role = state
        .roles
        .find_role_by_name(ADMIN_ROLE)
        .await
        .map_err(|e| anyhow::anyhow!("loading admin role: {e}"))?
        .context("admin role missing after seeding")?;
    let password_hash = state
        .hasher
        .hash(&password)
        .map_err(|e| anyhow::anyhow!("hashing bootstrap password: {e}"))?;
    let actor = state
        .actors
        .insert(NewActor {
            email: std::env::var("AGW_BOOTSTRAP_ADMIN_EMAIL").ok(),
            phone: None,
            username: "admin".into(),
            password_hash: Some(password_hash),
            display_name: Some("Administrator".into()),
            avatar_url: None,
            role_id: Some(role.id),
            role: role.name,
            kind: ActorKind::Human,
            email_verified: true,
            phone_verified: false,
        })
        .await
        .map_err(|e| anyhow::anyhow!("creating bootstrap admin: {e}"))?;
    tracing::info!(actor_id = %actor.id, "bootstrap admin created");
    Ok(())
}

/// Spawn the long-running background tasks: the audit drain worker and
/// the hourly GC tick. All of them exit when `shutdown` fires.
pub fn spawn_background_tasks(state: &AppState) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    // ── Audit drain worker ───────────────────────────────────────────
    handles.push(audit::spawn_worker(
        state.audit.clone(),
        state.audit_store.clone(),
        state.providers.geo.clone(),
        state.shutdown.clone(),
    ));

    // ── Hourly GC: sessions + expired OTP records ───────────────────
    {
        let sessions = state.sessions.clone();
        let otps = state.otps.clone();
        let shutdown = state.shutdown.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3_600));
            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = interval.tick() => {
                        if let Err(e) = sessions.gc().await {
                            tracing::warn!(error = %e, "session GC failed");
                        }
                        match otps.purge_expired(chrono::Utc::now()).await {
                            Ok(0) => {}
                            Ok(n) => tracing::info!(purged = n, "expired OTP records purged"),
                            Err(e) => tracing::warn!(error = %e, "OTP purge failed"),
                        }
                    }
                }
            }
            tracing::debug!("gc task stopped");
        }));
    }

    tracing::info!("background tasks spawned");
    handles
}
