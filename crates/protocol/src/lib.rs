//! Binary RPC wire contract.
//!
//! Frames are 4-byte length-prefixed; each frame body is a
//! protobuf-encoded [`RpcRequest`] or [`RpcResponse`] envelope whose
//! `payload` carries the per-method message. The integer tags below are
//! the normative contract; both sides must agree on them and nothing
//! else.
//!
//! Auth travels in the envelope's `authorization` field using the same
//! bearer semantics as the textual transport (`Bearer <token>` or an
//! `agw_`-prefixed API key).

use prost::Message;

/// Upper bound for one frame, envelope included.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ::prost::Enumeration)]
#[repr(i32)]
pub enum Method {
    Unknown = 0,
    ValidateToken = 1,
    GetUser = 2,
    CheckPermission = 3,
    IntrospectToken = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcRequest {
    #[prost(enumeration = "Method", tag = "1")]
    pub method: i32,
    #[prost(string, tag = "2")]
    pub request_id: ::prost::alloc::string::String,
    /// Caller credential, `Bearer <token>` or raw API key.
    #[prost(string, tag = "3")]
    pub authorization: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "4")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcResponse {
    #[prost(string, tag = "1")]
    pub request_id: ::prost::alloc::string::String,
    /// 0 on success, otherwise the HTTP-equivalent status code.
    #[prost(uint32, tag = "2")]
    pub status: u32,
    #[prost(string, tag = "3")]
    pub error_code: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub error_message: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "5")]
    pub payload: ::prost::alloc::vec::Vec<u8>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ValidateToken
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateTokenRequest {
    #[prost(string, tag = "1")]
    pub access_token: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateTokenResponse {
    #[prost(bool, tag = "1")]
    pub valid: bool,
    #[prost(string, tag = "2")]
    pub user_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub email: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub username: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "5")]
    pub roles: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "6")]
    pub error_message: ::prost::alloc::string::String,
    /// Unix seconds.
    #[prost(int64, tag = "7")]
    pub expires_at: i64,
    #[prost(bool, tag = "8")]
    pub is_active: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GetUser
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetUserRequest {
    #[prost(string, tag = "1")]
    pub user_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcUser {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub email: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub username: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub display_name: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "5")]
    pub roles: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "6")]
    pub kind: ::prost::alloc::string::String,
    #[prost(bool, tag = "7")]
    pub email_verified: bool,
    #[prost(bool, tag = "8")]
    pub is_active: bool,
    #[prost(bool, tag = "9")]
    pub totp_enabled: bool,
    /// Unix seconds.
    #[prost(int64, tag = "10")]
    pub created_at: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetUserResponse {
    #[prost(message, optional, tag = "1")]
    pub user: ::core::option::Option<RpcUser>,
    #[prost(string, tag = "2")]
    pub error_message: ::prost::alloc::string::String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CheckPermission
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckPermissionRequest {
    #[prost(string, tag = "1")]
    pub user_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub resource: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub action: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckPermissionResponse {
    #[prost(bool, tag = "1")]
    pub allowed: bool,
    #[prost(string, repeated, tag = "2")]
    pub roles: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "3")]
    pub error_message: ::prost::alloc::string::String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IntrospectToken
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntrospectTokenRequest {
    #[prost(string, tag = "1")]
    pub access_token: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntrospectTokenResponse {
    #[prost(bool, tag = "1")]
    pub active: bool,
    #[prost(string, tag = "2")]
    pub user_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub email: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub username: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "5")]
    pub roles: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(int64, tag = "6")]
    pub issued_at: i64,
    #[prost(int64, tag = "7")]
    pub expires_at: i64,
    #[prost(int64, tag = "8")]
    pub not_before: i64,
    #[prost(string, tag = "9")]
    pub subject: ::prost::alloc::string::String,
    #[prost(bool, tag = "10")]
    pub blacklisted: bool,
    #[prost(string, tag = "11")]
    pub error_message: ::prost::alloc::string::String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl RpcRequest {
    /// Build a request with an encoded per-method payload.
    pub fn new<M: Message>(method: Method, request_id: &str, authorization: &str, payload: &M) -> Self {
        Self {
            method: method as i32,
            request_id: request_id.to_string(),
            authorization: authorization.to_string(),
            payload: payload.encode_to_vec(),
        }
    }

    pub fn decode_payload<M: Message + Default>(&self) -> Result<M, prost::DecodeError> {
        M::decode(self.payload.as_slice())
    }
}

impl RpcResponse {
    pub fn ok<M: Message>(request_id: &str, payload: &M) -> Self {
        Self {
            request_id: request_id.to_string(),
            status: 0,
            error_code: String::new(),
            error_message: String::new(),
            payload: payload.encode_to_vec(),
        }
    }

    pub fn error(request_id: &str, status: u32, code: &str, message: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            status,
            error_code: code.to_string(),
            error_message: message.to_string(),
            payload: Vec::new(),
        }
    }

    pub fn decode_payload<M: Message + Default>(&self) -> Result<M, prost::DecodeError> {
        M::decode(self.payload.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_with_nested_payload() {
        let request = RpcRequest::new(
            Method::CheckPermission,
            "req-1",
            "Bearer token",
            &CheckPermissionRequest {
                user_id: "u-1".into(),
                resource: "users".into(),
                action: "read".into(),
            },
        );

        let bytes = request.encode_to_vec();
        assert!(bytes.len() < MAX_FRAME_BYTES);

        let decoded = RpcRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.method, Method::CheckPermission as i32);
        let inner: CheckPermissionRequest = decoded.decode_payload().unwrap();
        assert_eq!(inner.resource, "users");
    }

    #[test]
    fn error_response_has_empty_payload() {
        let response = RpcResponse::error("req-2", 401, "expired", "credential expired");
        let decoded = RpcResponse::decode(response.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.status, 401);
        assert_eq!(decoded.error_code, "expired");
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn unknown_method_decodes_as_unknown() {
        let raw = RpcRequest {
            method: 99,
            request_id: "req-3".into(),
            authorization: String::new(),
            payload: Vec::new(),
        };
        let decoded = RpcRequest::decode(raw.encode_to_vec().as_slice()).unwrap();
        assert_eq!(Method::try_from(decoded.method).ok(), None);
    }
}
