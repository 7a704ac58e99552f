//! Refresh-session registry.
//!
//! Owns the refresh-token lifecycle on top of the session-store port:
//! creation with mandatory rotation of a predecessor, live lookup by
//! refresh digest, revocation, paged listings, device statistics, and
//! GC of expired/stale rows.

pub mod device;
pub mod registry;

pub use device::parse_user_agent;
pub use registry::{SessionRegistry, SessionStats};
