use std::fmt;

/// Why a presented credential was rejected.
///
/// Each variant maps to a distinct wire-level code so callers can tell a
/// missing header apart from a blacklisted token without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFault {
    /// No credential was presented.
    Missing,
    /// The credential could not be parsed or its signature is wrong.
    Malformed,
    /// The credential was valid once but its expiry has passed.
    Expired,
    /// The credential (or its session) has been revoked or blacklisted.
    Revoked,
    /// The credential resolves to a deactivated actor.
    ActorInactive,
    /// Password or code mismatch.
    BadCredentials,
}

impl CredentialFault {
    /// Stable wire code for this fault.
    pub fn code(self) -> &'static str {
        match self {
            CredentialFault::Missing => "missing",
            CredentialFault::Malformed => "malformed",
            CredentialFault::Expired => "expired",
            CredentialFault::Revoked => "revoked",
            CredentialFault::ActorInactive => "actor_inactive",
            CredentialFault::BadCredentials => "bad_credentials",
        }
    }
}

impl fmt::Display for CredentialFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CredentialFault::Missing => "credential missing",
            CredentialFault::Malformed => "credential malformed",
            CredentialFault::Expired => "credential expired",
            CredentialFault::Revoked => "credential revoked",
            CredentialFault::ActorInactive => "account is inactive",
            CredentialFault::BadCredentials => "invalid credentials",
        };
        f.write_str(msg)
    }
}

/// Shared error type used across all authgate crates.
///
/// The variants mirror the transport-independent taxonomy: validation,
/// authentication, authorization, not-found, conflict, rate-limited,
/// policy-blocked, upstream-unavailable, internal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("authentication: {0}")]
    Unauthenticated(CredentialFault),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("service unavailable: {0}")]
    Maintenance(String),

    #[error("upstream {service}: {message}")]
    Upstream { service: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code used in error bodies on both
    /// transports.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Unauthenticated(fault) => fault.code(),
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::RateLimited { .. } => "rate_limited",
            Error::Blocked(_) => "blocked",
            Error::Maintenance(_) => "maintenance",
            Error::Upstream { .. } => "upstream_unavailable",
            Error::Config(_) => "config",
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => "internal",
        }
    }

    /// True when a client retry against the same endpoint can succeed
    /// without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimited { .. } | Error::Maintenance(_) | Error::Upstream { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
