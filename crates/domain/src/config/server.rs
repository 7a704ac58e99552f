use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    /// Textual (JSON) API port.
    #[serde(default = "d_http_port")]
    pub port: u16,
    /// Binary RPC port.
    #[serde(default = "d_rpc_port")]
    pub rpc_port: u16,
    /// Deployment environment tag used in logs ("development", "production").
    #[serde(default = "d_env")]
    pub env: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Coarse per-IP transport throttle in front of the domain rate
    /// limiter. `None` disables the layer.
    #[serde(default)]
    pub rate_limit: Option<TransportRateLimit>,
    /// Headers consulted (in order) to resolve the client IP behind a
    /// trusted proxy. The transport remote address is the fallback.
    #[serde(default = "d_proxy_headers")]
    pub trusted_proxy_headers: Vec<String>,
    #[serde(default)]
    pub csrf: CsrfConfig,
    /// Seconds to wait for in-flight requests on shutdown.
    #[serde(default = "d_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    /// Per-request deadline for interactive routes.
    #[serde(default = "d_request_timeout")]
    pub request_timeout_secs: u64,
    /// Per-request deadline for admin listing routes.
    #[serde(default = "d_admin_timeout")]
    pub admin_request_timeout_secs: u64,
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_http_port(),
            rpc_port: d_rpc_port(),
            env: d_env(),
            cors: CorsConfig::default(),
            rate_limit: None,
            trusted_proxy_headers: d_proxy_headers(),
            csrf: CsrfConfig::default(),
            shutdown_grace_secs: d_shutdown_grace(),
            request_timeout_secs: d_request_timeout(),
            admin_request_timeout_secs: d_admin_timeout(),
            max_concurrent_requests: d_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT
    /// recommended). Defaults to localhost-only.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransportRateLimit {
    pub requests_per_second: u64,
    pub burst_size: u32,
}

/// CSRF double-submit settings for the textual transport. Disabled by
/// default; when enabled, state-changing requests must echo the token
/// cookie in the configured header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_csrf_cookie")]
    pub cookie_name: String,
    #[serde(default = "d_csrf_header")]
    pub header_name: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: d_csrf_cookie(),
            header_name: d_csrf_header(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_http_port() -> u16 {
    8180
}
fn d_rpc_port() -> u16 {
    8181
}
fn d_env() -> String {
    "development".into()
}
fn d_proxy_headers() -> Vec<String> {
    vec!["x-forwarded-for".into(), "x-real-ip".into()]
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
fn d_shutdown_grace() -> u64 {
    30
}
fn d_request_timeout() -> u64 {
    10
}
fn d_admin_timeout() -> u64 {
    30
}
fn d_csrf_cookie() -> String {
    "csrf_token".into()
}
fn d_csrf_header() -> String {
    "x-csrf-token".into()
}
fn d_max_concurrent() -> usize {
    256
}
