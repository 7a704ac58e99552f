use agw_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delivery ports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outbound email port. Implementations return a provider-side message
/// id on success and must not block beyond their configured timeout.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String>;
}

/// Outbound SMS port.
#[async_trait::async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Third-party identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Profile fetched from a third-party provider after code exchange.
#[derive(Debug, Clone)]
pub struct ExternalProfile {
    pub provider: String,
    /// Provider-scoped subject identifier.
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// OAuth2 authorization-code provider port.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Where to send the browser, carrying the one-shot `state`.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange the callback code and fetch the external profile.
    async fn exchange(&self, code: &str) -> Result<ExternalProfile>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Geo-IP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub region: Option<String>,
}

/// IP → country/region lookup used to enrich audit events. `None` means
/// "don't know"; enrichment is always best-effort.
#[async_trait::async_trait]
pub trait GeoResolver: Send + Sync {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo>;
}
