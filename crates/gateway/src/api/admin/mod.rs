//! Admin surface (requires the admin role).
//!
//! Every mutation here records an audit event; RBAC changes additionally
//! invalidate the in-process permission matrix.

pub mod rbac;
pub mod system;
pub mod users;
