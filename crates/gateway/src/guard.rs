//! Request gating: client-IP resolution, IP filter, maintenance mode,
//! the general per-principal rate limit, and optional CSRF double-submit.
//!
//! Order on the way in: IP filter first, then maintenance, then the
//! rate limiter — a denied address must not consume rate budget, and a
//! maintenance page must not be rate-limited away.

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use agw_credentials::constant_time_eq;
use agw_domain::Error;

use crate::api::error::ApiError;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client info
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-request client identity resolved at the edge and stashed in
/// request extensions for handlers and the audit pipeline.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// The rate-limit principal: the IP, or a shared bucket when the
    /// transport gave us nothing.
    pub fn principal(&self) -> String {
        self.ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".into())
    }

    pub fn ip_string(&self) -> Option<String> {
        self.ip.map(|ip| ip.to_string())
    }
}

/// Resolve the client IP: configured trusted-proxy headers in order,
/// then the transport remote address.
pub fn client_ip(state: &AppState, headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<IpAddr> {
    for header in &state.config.server.trusted_proxy_headers {
        if let Some(value) = headers.get(header.as_str()).and_then(|v| v.to_str().ok()) {
            // X-Forwarded-For carries a chain; the leftmost entry is the
            // original client.
            let first = value.split(',').next().unwrap_or("").trim();
            if let Ok(ip) = first.parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    remote.map(|addr| addr.ip())
}

pub fn client_info(state: &AppState, req: &Request<Body>) -> ClientInfo {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    ClientInfo {
        ip: client_ip(state, req.headers(), remote),
        user_agent: req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Edge gate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Paths that stay reachable during maintenance. Matched with and
/// without the `/api` prefix: nesting strips it before this middleware
/// sees the URI.
fn maintenance_exempt(path: &str) -> bool {
    let path = path.strip_prefix("/api").unwrap_or(path);
    matches!(
        path,
        "/auth/health" | "/auth/ready" | "/auth/live" | "/system/maintenance"
    )
}

/// Outermost middleware on the textual surface.
pub async fn gate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let info = client_info(&state, &req);

    // 1. IP filter, before anything else on the same principal.
    if let Some(ip) = info.ip {
        if !state.ip_filter.permits(ip) {
            tracing::warn!(ip = %ip, "request blocked by IP filter");
            return ApiError::from(Error::Blocked("address not allowed".into())).into_response();
        }
    }

    // 2. Maintenance mode, sparing health and the status endpoint.
    if !maintenance_exempt(req.uri().path()) {
        let status = state.maintenance.status().await;
        if status.enabled {
            return ApiError::from(Error::Maintenance(if status.message.is_empty() {
                "service is under maintenance".into()
            } else {
                status.message
            }))
            .into_response();
        }
    }

    // 3. General API limit per principal.
    if let Err(err) = state
        .limiter
        .check("api", &info.principal(), state.config.limits.api)
        .await
    {
        return ApiError::from(err).into_response();
    }

    req.extensions_mut().insert(info);
    next.run(req).await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request deadlines
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn run_with_deadline(deadline: std::time::Duration, req: Request<Body>, next: Next) -> Response {
    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(deadline_secs = deadline.as_secs(), "request deadline exceeded");
            ApiError::from(Error::Upstream {
                service: "gateway".into(),
                message: "request deadline exceeded".into(),
            })
            .into_response()
        }
    }
}

/// Deadline for interactive routes. Dropping the handler future aborts
/// its suspended I/O.
pub async fn interactive_deadline(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let deadline = std::time::Duration::from_secs(state.config.server.request_timeout_secs);
    run_with_deadline(deadline, req, next).await
}

/// Longer deadline for admin listing routes.
pub async fn admin_deadline(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let deadline = std::time::Duration::from_secs(state.config.server.admin_request_timeout_secs);
    run_with_deadline(deadline, req, next).await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CSRF double-submit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get("cookie")?
        .to_str()
        .ok()?
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
}

/// When enabled, state-changing requests must echo the token cookie in
/// the configured header; the comparison is constant-time. Disabled
/// config makes this a pass-through.
pub async fn csrf(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let config = &state.config.server.csrf;
    if !config.enabled || !is_state_changing(req.method()) {
        return next.run(req).await;
    }

    let cookie = cookie_value(req.headers(), &config.cookie_name);
    let header = req
        .headers()
        .get(config.header_name.as_str())
        .and_then(|v| v.to_str().ok());

    match (cookie, header) {
        (Some(cookie), Some(header)) if constant_time_eq(cookie, header) => next.run(req).await,
        _ => ApiError::from(Error::Forbidden("csrf token mismatch".into())).into_response(),
    }
}

fn is_state_changing(method: &Method) -> bool {
    method == Method::POST
        || method == Method::PUT
        || method == Method::DELETE
        || method == Method::PATCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_parsing_finds_the_named_pair() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", "a=1; csrf_token=tok-123; b=2".parse().unwrap());
        assert_eq!(cookie_value(&headers, "csrf_token"), Some("tok-123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn state_changing_methods() {
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::DELETE));
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
    }
}
