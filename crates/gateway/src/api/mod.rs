pub mod admin;
pub mod apikeys;
pub mod auth;
pub mod error;
pub mod health;
pub mod otp;
pub mod profile;
pub mod sessions;
pub mod twofactor;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::guard;
use crate::state::AppState;
use crate::validate;

/// Build the full API router under the `/api` prefix.
///
/// Routes are split three ways: **public** (pre-auth flows and health),
/// **protected** (behind the credential validator), and **admin**
/// (validator + admin role). The edge gate (IP filter → maintenance →
/// general rate limit) and optional CSRF wrap everything.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        // Health probes
        .route("/auth/health", get(health::health))
        .route("/auth/ready", get(health::ready))
        .route("/auth/live", get(health::live))
        .route("/system/maintenance", get(health::maintenance_status))
        .route("/auth/csrf", get(health::csrf_token))
        // Password flows
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/2fa/login/verify", post(auth::twofa_login_verify))
        // Email verification
        .route("/auth/verify/resend", post(profile::resend_verification))
        .route("/auth/verify/email", post(profile::verify_email))
        // Password reset
        .route("/auth/password/reset/request", post(otp::reset_request))
        .route("/auth/password/reset/complete", post(otp::reset_complete))
        // Generic OTP
        .route("/otp/send", post(otp::send))
        .route("/otp/verify", post(otp::verify))
        // Passwordless
        .route("/auth/passwordless/request", post(otp::passwordless_request))
        .route("/auth/passwordless/verify", post(otp::passwordless_verify))
        // Third-party providers
        .route("/auth/providers", get(auth::providers))
        .route("/auth/:provider", get(auth::provider_start))
        .route("/auth/:provider/callback", get(auth::provider_callback));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/profile", get(profile::get_profile))
        .route("/auth/profile", put(profile::update_profile))
        .route("/auth/change-password", post(profile::change_password))
        // Second factor management
        .route("/auth/2fa/setup", post(twofactor::setup))
        .route("/auth/2fa/verify", post(twofactor::verify))
        .route("/auth/2fa/disable", post(twofactor::disable))
        .route("/auth/2fa/status", get(twofactor::status))
        .route(
            "/auth/2fa/backup-codes/regenerate",
            post(twofactor::regenerate_backup_codes),
        )
        // API keys
        .route("/api-keys", get(apikeys::list))
        .route("/api-keys", post(apikeys::create))
        .route("/api-keys/:id", get(apikeys::get))
        .route("/api-keys/:id", put(apikeys::update))
        .route("/api-keys/:id", delete(apikeys::remove))
        // Own sessions
        .route("/sessions", get(sessions::list))
        .route("/sessions", delete(sessions::revoke_all))
        .route("/sessions/:id", put(sessions::rename))
        .route("/sessions/:id", delete(sessions::revoke))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            validate::require_auth,
        ));

    let admin = Router::new()
        .route("/admin/stats", get(admin::system::stats))
        .route("/admin/users", get(admin::users::list))
        .route("/admin/users", post(admin::users::create))
        .route("/admin/users/:id", get(admin::users::get))
        .route("/admin/users/:id", put(admin::users::update))
        .route("/admin/users/:id", delete(admin::users::deactivate))
        .route("/admin/users/:id/role", put(admin::rbac::assign_role))
        .route("/admin/roles", get(admin::rbac::list_roles))
        .route("/admin/roles", post(admin::rbac::create_role))
        .route("/admin/roles/:id", put(admin::rbac::update_role))
        .route("/admin/roles/:id", delete(admin::rbac::delete_role))
        .route(
            "/admin/roles/:id/permissions/:permission_id",
            put(admin::rbac::grant_permission),
        )
        .route(
            "/admin/roles/:id/permissions/:permission_id",
            delete(admin::rbac::revoke_permission),
        )
        .route("/admin/permissions", get(admin::rbac::list_permissions))
        .route("/admin/permissions", post(admin::rbac::create_permission))
        .route("/admin/permissions/:id", put(admin::rbac::update_permission))
        .route(
            "/admin/permissions/:id",
            delete(admin::rbac::delete_permission),
        )
        .route("/admin/matrix", get(admin::rbac::export_matrix))
        .route("/admin/audit", get(admin::system::list_audit))
        .route("/admin/audit/geo", get(admin::system::geo_distribution))
        .route("/admin/ip-rules", get(admin::system::list_ip_rules))
        .route("/admin/ip-rules", post(admin::system::create_ip_rule))
        .route("/admin/ip-rules/:id", delete(admin::system::delete_ip_rule))
        .route("/admin/maintenance", put(admin::system::set_maintenance))
        .route("/admin/branding", get(admin::system::get_branding))
        .route("/admin/branding", put(admin::system::set_branding))
        .route("/admin/sessions", get(admin::system::list_sessions))
        .route(
            "/admin/sessions/:id",
            delete(admin::system::revoke_session),
        )
        .route(
            "/admin/users/:id/sessions",
            delete(admin::system::revoke_actor_sessions),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            validate::require_admin,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::admin_deadline,
        ));

    let api = public
        .merge(protected)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::interactive_deadline,
        ))
        .merge(admin)
        .layer(middleware::from_fn_with_state(state.clone(), guard::csrf))
        .layer(middleware::from_fn_with_state(state, guard::gate));

    Router::new()
        .nest("/api", api)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
