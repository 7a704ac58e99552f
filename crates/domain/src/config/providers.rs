use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound collaborators (mail, SMS, identity providers, geo-IP)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    /// Third-party identity providers, keyed by `name` in routes
    /// (`/api/auth/:provider`).
    #[serde(default)]
    pub idps: Vec<IdpConfig>,
    #[serde(default)]
    pub geoip: GeoConfig,
}

/// Which adapter implements a delivery port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryBackend {
    /// Log the message instead of sending it (development default).
    Log,
    /// POST to the configured HTTP relay.
    Http,
}

impl Default for DeliveryBackend {
    fn default() -> Self {
        DeliveryBackend::Log
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub backend: DeliveryBackend,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "d_mail_from")]
    pub from: String,
    #[serde(default = "d_delivery_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: DeliveryBackend::Log,
            url: String::new(),
            api_key: String::new(),
            from: d_mail_from(),
            timeout_secs: d_delivery_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub backend: DeliveryBackend,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default = "d_delivery_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            backend: DeliveryBackend::Log,
            url: String::new(),
            api_key: String::new(),
            sender_id: String::new(),
            timeout_secs: d_delivery_timeout(),
        }
    }
}

/// One OAuth2 authorization-code provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpConfig {
    pub name: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    #[serde(default = "d_idp_scopes")]
    pub scopes: Vec<String>,
    /// Callback URL registered with the provider.
    pub redirect_url: String,
    #[serde(default = "d_idp_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "d_idp_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: String::new(),
            timeout_secs: d_idp_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_mail_from() -> String {
    "no-reply@authgate.local".into()
}
fn d_delivery_timeout() -> u64 {
    30
}
fn d_idp_timeout() -> u64 {
    10
}
fn d_idp_scopes() -> Vec<String> {
    vec!["openid".into(), "email".into(), "profile".into()]
}
