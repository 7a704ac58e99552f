//! Outbound collaborator ports and their adapters.
//!
//! Mail, SMS, third-party identity, and geo-IP are external systems; the
//! gateway consumes them through the traits in [`traits`]. Concrete
//! adapters talk HTTP via `reqwest`; the log adapters stand in during
//! development. Selection happens once at boot in [`registry`].

pub mod geoip;
pub mod mail;
pub mod oauth;
pub mod registry;
pub mod sms;
pub mod traits;
pub mod util;

pub use registry::ProviderRegistry;
pub use traits::{ExternalProfile, GeoInfo, GeoResolver, IdentityProvider, Mailer, SmsSender};
