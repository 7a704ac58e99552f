mod auth;
mod limits;
mod providers;
mod server;
mod storage;
mod tokens;

pub use auth::*;
pub use limits::*;
pub use providers::*;
pub use server::*;
pub use storage::*;
pub use tokens::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Config {
    /// Load from a TOML file (when it exists), then apply environment
    /// overrides. A missing file yields the defaults — every deployment
    /// knob is reachable through the environment alone.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("{}: {e}", p.display())))?
            }
            _ => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override individual fields from `AGW_*` environment variables.
    pub fn apply_env(&mut self) {
        env_str("AGW_HOST", &mut self.server.host);
        env_parse("AGW_HTTP_PORT", &mut self.server.port);
        env_parse("AGW_RPC_PORT", &mut self.server.rpc_port);
        env_str("AGW_ENV", &mut self.server.env);
        if let Ok(origins) = std::env::var("AGW_CORS_ORIGINS") {
            self.server.cors.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        env_str("AGW_DB_HOST", &mut self.database.host);
        env_parse("AGW_DB_PORT", &mut self.database.port);
        env_str("AGW_DB_USER", &mut self.database.user);
        env_str("AGW_DB_PASSWORD", &mut self.database.password);
        env_str("AGW_DB_NAME", &mut self.database.database);
        env_parse("AGW_DB_SSL", &mut self.database.ssl);
        env_parse("AGW_DB_MAX_OPEN_CONNS", &mut self.database.max_open_conns);
        env_parse("AGW_DB_MAX_IDLE_CONNS", &mut self.database.max_idle_conns);

        env_str("AGW_CACHE_URL", &mut self.cache.url);

        // Secrets append (newest last) so rotation can be driven from the
        // environment without editing the file.
        if let Ok(secret) = std::env::var("AGW_ACCESS_SECRET") {
            if !secret.is_empty() && !self.tokens.access_secrets.contains(&secret) {
                self.tokens.access_secrets.push(secret);
            }
        }
        if let Ok(secret) = std::env::var("AGW_REFRESH_SECRET") {
            if !secret.is_empty() && !self.tokens.refresh_secrets.contains(&secret) {
                self.tokens.refresh_secrets.push(secret);
            }
        }
        env_parse("AGW_ACCESS_TTL_SECS", &mut self.tokens.access_ttl_secs);
        env_parse("AGW_REFRESH_TTL_SECS", &mut self.tokens.refresh_ttl_secs);

        env_parse("AGW_KDF_MEMORY_KIB", &mut self.auth.kdf.memory_kib);
        env_parse("AGW_KDF_ITERATIONS", &mut self.auth.kdf.iterations);

        env_str("AGW_MAIL_URL", &mut self.providers.mail.url);
        env_str("AGW_MAIL_API_KEY", &mut self.providers.mail.api_key);
        env_str("AGW_MAIL_FROM", &mut self.providers.mail.from);
        env_str("AGW_SMS_URL", &mut self.providers.sms.url);
        env_str("AGW_SMS_API_KEY", &mut self.providers.sms.api_key);
        env_str("AGW_GEOIP_URL", &mut self.providers.geoip.url);
        env_str("AGW_GEOIP_API_KEY", &mut self.providers.geoip.api_key);
    }
}

fn env_str(name: &str, slot: &mut String) {
    if let Ok(value) = std::env::var(name) {
        if !value.is_empty() {
            *slot = value;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, slot: &mut T) {
    if let Ok(value) = std::env::var(name) {
        if let Ok(parsed) = value.parse::<T>() {
            *slot = parsed;
        } else {
            tracing::warn!(var = name, value = %value, "ignoring unparsable env override");
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let production = self.server.env == "production";

        let mut push = |severity, field: &str, message: String| {
            issues.push(ConfigIssue {
                severity,
                field: field.to_string(),
                message,
            });
        };

        if self.server.port == self.server.rpc_port {
            push(
                ConfigSeverity::Error,
                "server.rpc_port",
                format!("RPC port {} collides with the HTTP port", self.server.rpc_port),
            );
        }

        for (field, secrets) in [
            ("tokens.access_secrets", &self.tokens.access_secrets),
            ("tokens.refresh_secrets", &self.tokens.refresh_secrets),
        ] {
            if secrets.is_empty() {
                let severity = if production {
                    ConfigSeverity::Error
                } else {
                    ConfigSeverity::Warning
                };
                push(
                    severity,
                    field,
                    "no signing secret configured; a random per-boot secret will be used".into(),
                );
            } else if secrets.iter().any(|s| s.len() < 32) {
                push(
                    ConfigSeverity::Warning,
                    field,
                    "signing secrets shorter than 32 bytes weaken HS256".into(),
                );
            }
        }

        if self.tokens.access_ttl_secs == 0 || self.tokens.refresh_ttl_secs == 0 {
            push(
                ConfigSeverity::Error,
                "tokens",
                "token TTLs must be non-zero".into(),
            );
        }

        if production
            && self.server.cors.allowed_origins.iter().any(|o| o == "*")
        {
            push(
                ConfigSeverity::Warning,
                "server.cors.allowed_origins",
                "wildcard CORS origin in production".into(),
            );
        }

        for idp in &self.providers.idps {
            if idp.client_id.is_empty() || idp.auth_url.is_empty() || idp.token_url.is_empty() {
                push(
                    ConfigSeverity::Error,
                    "providers.idps",
                    format!("provider '{}' is missing client_id/auth_url/token_url", idp.name),
                );
            }
        }

        if self.providers.geoip.enabled && self.providers.geoip.url.is_empty() {
            push(
                ConfigSeverity::Error,
                "providers.geoip.url",
                "geo enrichment enabled without a lookup URL".into(),
            );
        }

        issues
    }
}
