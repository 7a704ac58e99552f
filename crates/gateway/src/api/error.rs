//! Uniform error mapping for the textual transport.
//!
//! Handlers return `ApiResult<T>`; every failure serializes to the same
//! body shape `{error, message, details?, status_code}` with the
//! HTTP status both in the envelope and on the wire. The RPC transport
//! reuses [`wire_status`] so the two surfaces agree on codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use agw_domain::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// HTTP-equivalent status for a taxonomy arm. Shared with the RPC
/// transport.
pub fn wire_status(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        Error::Forbidden(_) | Error::Blocked(_) => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::Maintenance(_) | Error::Upstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = wire_status(&self.0);

        // Internal detail never reaches the wire; it is logged with a
        // correlation id instead.
        let (code, message, details) = match &self.0 {
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
                let correlation_id = uuid::Uuid::new_v4();
                tracing::error!(%correlation_id, error = %self.0, "internal error");
                (
                    "internal",
                    "internal error".to_string(),
                    Some(serde_json::json!({ "correlation_id": correlation_id })),
                )
            }
            Error::RateLimited { retry_after_secs } => (
                self.0.code(),
                self.0.to_string(),
                Some(serde_json::json!({ "retry_after": retry_after_secs })),
            ),
            other => (other.code(), other.to_string(), None),
        };

        let mut body = serde_json::json!({
            "error": code,
            "message": message,
            "status_code": status.as_u16(),
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        let mut response = (status, Json(body)).into_response();
        if let Error::RateLimited { retry_after_secs } = &self.0 {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert("retry-after", value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_domain::CredentialFault;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(
            wire_status(&Error::Unauthenticated(CredentialFault::Expired)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            wire_status(&Error::Conflict("email".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            wire_status(&Error::RateLimited { retry_after_secs: 5 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            wire_status(&Error::Maintenance("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            wire_status(&Error::Validation("shape".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
