//! Binary RPC surface over a real TCP socket with in-memory ports.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use tokio_util::codec::LengthDelimitedCodec;
use uuid::Uuid;

use agw_credentials::mint_api_key;
use agw_domain::config::Config;
use agw_domain::model::{ActorKind, ApiKey, NewActor, SERVICE_ROLE};
use agw_store::{ActorStore, ApiKeyStore, RoleStore};
use agw_gateway::bootstrap::build_app_state;
use agw_gateway::rpc;
use agw_gateway::state::AppState;
use agw_protocol::{
    CheckPermissionRequest, CheckPermissionResponse, GetUserRequest, GetUserResponse,
    IntrospectTokenRequest, IntrospectTokenResponse, Method, RpcRequest, RpcResponse,
    ValidateTokenRequest, ValidateTokenResponse,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Rpc {
    framed: tokio_util::codec::Framed<tokio::net::TcpStream, LengthDelimitedCodec>,
}

impl Rpc {
    async fn call<M: Message>(
        &mut self,
        method: Method,
        authorization: &str,
        payload: &M,
    ) -> RpcResponse {
        let request = RpcRequest::new(method, &Uuid::new_v4().to_string(), authorization, payload);
        self.framed
            .send(Bytes::from(request.encode_to_vec()))
            .await
            .expect("send frame");
        let frame = self
            .framed
            .next()
            .await
            .expect("response frame")
            .expect("frame read");
        let response = RpcResponse::decode(frame.as_ref()).expect("decode response");
        assert_eq!(response.request_id, request.request_id);
        response
    }
}

async fn harness() -> (AppState, Rpc, Arc<tokio::sync::Notify>) {
    let mut config = Config::default();
    config.tokens.access_secrets = vec!["rpc-access-secret-rpc-access-secret".into()];
    config.tokens.refresh_secrets = vec!["rpc-refresh-secret-rpc-refresh-secret".into()];
    config.auth.kdf.memory_kib = 8;
    config.auth.kdf.iterations = 1;

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let state = build_app_state(Arc::new(config), shutdown.clone())
        .await
        .expect("app state");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(rpc::serve(state.clone(), listener, shutdown.clone()));

    let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let framed = LengthDelimitedCodec::builder()
        .max_frame_length(agw_protocol::MAX_FRAME_BYTES)
        .new_framed(stream);
    (state, Rpc { framed }, shutdown)
}

/// A service account with an `agw_` API key scoped to `users.read`.
async fn seed_service_account(state: &AppState) -> (Uuid, String) {
    let role = state
        .roles
        .find_role_by_name(SERVICE_ROLE)
        .await
        .unwrap()
        .unwrap();
    let actor = state
        .actors
        .insert(NewActor {
            email: None,
            phone: None,
            username: "reporting-bot".into(),
            password_hash: None,
            display_name: None,
            avatar_url: None,
            role_id: Some(role.id),
            role: role.name,
            kind: ActorKind::Service,
            email_verified: false,
            phone_verified: false,
        })
        .await
        .unwrap();

    let minted = mint_api_key();
    state
        .api_keys
        .insert(ApiKey {
            id: Uuid::new_v4(),
            actor_id: actor.id,
            name: "reporting".into(),
            description: String::new(),
            prefix: minted.prefix.clone(),
            digest: minted.digest.clone(),
            scopes: vec!["users.read".into()],
            expires_at: None,
            last_used_at: None,
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    (actor.id, minted.plaintext)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 4: API key over the RPC surface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn api_key_validates_and_permissions_resolve() {
    let (state, mut rpc, _shutdown) = harness().await;
    let (actor_id, api_key) = seed_service_account(&state).await;

    // ValidateToken accepts the API key as the credential under test.
    let response = rpc
        .call(
            Method::ValidateToken,
            "",
            &ValidateTokenRequest {
                access_token: api_key.clone(),
            },
        )
        .await;
    assert_eq!(response.status, 0, "{}", response.error_message);
    let validated: ValidateTokenResponse = response.decode_payload().unwrap();
    assert!(validated.valid);
    assert_eq!(validated.user_id, actor_id.to_string());
    assert_eq!(validated.roles, vec!["service".to_string()]);
    assert!(validated.is_active);

    // The service role grants users.read and nothing more.
    let response = rpc
        .call(
            Method::CheckPermission,
            &api_key,
            &CheckPermissionRequest {
                user_id: actor_id.to_string(),
                resource: "users".into(),
                action: "read".into(),
            },
        )
        .await;
    let checked: CheckPermissionResponse = response.decode_payload().unwrap();
    assert!(checked.allowed);

    let response = rpc
        .call(
            Method::CheckPermission,
            &api_key,
            &CheckPermissionRequest {
                user_id: actor_id.to_string(),
                resource: "users".into(),
                action: "delete".into(),
            },
        )
        .await;
    let checked: CheckPermissionResponse = response.decode_payload().unwrap();
    assert!(!checked.allowed);

    // GetUser resolves the service actor.
    let response = rpc
        .call(
            Method::GetUser,
            &api_key,
            &GetUserRequest {
                user_id: actor_id.to_string(),
            },
        )
        .await;
    let user: GetUserResponse = response.decode_payload().unwrap();
    assert_eq!(user.user.unwrap().username, "reporting-bot");
}

#[tokio::test]
async fn unauthenticated_get_user_is_rejected() {
    let (state, mut rpc, _shutdown) = harness().await;
    let (actor_id, _key) = seed_service_account(&state).await;

    let response = rpc
        .call(
            Method::GetUser,
            "",
            &GetUserRequest {
                user_id: actor_id.to_string(),
            },
        )
        .await;
    assert_eq!(response.status, 401);
    assert_eq!(response.error_code, "missing");
}

#[tokio::test]
async fn introspection_reports_claims_and_blacklist() {
    let (state, mut rpc, _shutdown) = harness().await;

    let actor = state
        .actors
        .insert(NewActor {
            email: Some("intro@x.test".into()),
            phone: None,
            username: "intro".into(),
            password_hash: None,
            display_name: None,
            avatar_url: None,
            role_id: None,
            role: "user".into(),
            kind: ActorKind::Human,
            email_verified: true,
            phone_verified: false,
        })
        .await
        .unwrap();
    let (token, claims) = state
        .tokens
        .mint_access(actor.id, "intro", Some("intro@x.test"), "user")
        .unwrap();

    let response = rpc
        .call(
            Method::IntrospectToken,
            "",
            &IntrospectTokenRequest {
                access_token: token.clone(),
            },
        )
        .await;
    let introspected: IntrospectTokenResponse = response.decode_payload().unwrap();
    assert!(introspected.active);
    assert!(!introspected.blacklisted);
    assert_eq!(introspected.subject, actor.id.to_string());
    assert_eq!(introspected.issued_at, claims.iat);
    assert_eq!(introspected.expires_at, claims.exp);

    // Blacklist the digest and introspect again.
    state
        .blacklist
        .revoke(
            &agw_credentials::sha256_hex(&token),
            std::time::Duration::from_secs(60),
        )
        .await
        .unwrap();
    let response = rpc
        .call(
            Method::IntrospectToken,
            "",
            &IntrospectTokenRequest {
                access_token: token,
            },
        )
        .await;
    let introspected: IntrospectTokenResponse = response.decode_payload().unwrap();
    assert!(!introspected.active);
    assert!(introspected.blacklisted);
}

#[tokio::test]
async fn unknown_method_is_a_validation_error() {
    let (_state, mut rpc, _shutdown) = harness().await;
    let response = rpc
        .call(Method::Unknown, "", &ValidateTokenRequest::default())
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(response.error_code, "validation");
}
