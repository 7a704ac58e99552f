use std::collections::HashMap;
use std::sync::Arc;

use agw_domain::config::{DeliveryBackend, ProvidersConfig};
use agw_domain::Result;

use crate::geoip::{HttpGeoResolver, NoopGeoResolver};
use crate::mail::{HttpMailer, LogMailer};
use crate::oauth::OAuth2Provider;
use crate::sms::{HttpSms, LogSms};
use crate::traits::{GeoResolver, IdentityProvider, Mailer, SmsSender};

/// All outbound collaborators, selected once at initialization.
pub struct ProviderRegistry {
    pub mailer: Arc<dyn Mailer>,
    pub sms: Arc<dyn SmsSender>,
    idps: HashMap<String, Arc<dyn IdentityProvider>>,
    pub geo: Arc<dyn GeoResolver>,
}

impl ProviderRegistry {
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mailer: Arc<dyn Mailer> = match config.mail.backend {
            DeliveryBackend::Http => Arc::new(HttpMailer::new(&config.mail)?),
            DeliveryBackend::Log => Arc::new(LogMailer),
        };
        let sms: Arc<dyn SmsSender> = match config.sms.backend {
            DeliveryBackend::Http => Arc::new(HttpSms::new(&config.sms)?),
            DeliveryBackend::Log => Arc::new(LogSms),
        };

        let mut idps: HashMap<String, Arc<dyn IdentityProvider>> = HashMap::new();
        for idp in &config.idps {
            idps.insert(
                idp.name.clone(),
                Arc::new(OAuth2Provider::new(idp.clone())?),
            );
        }

        let geo: Arc<dyn GeoResolver> = match HttpGeoResolver::new(&config.geoip) {
            Some(resolver) => Arc::new(resolver),
            None => Arc::new(NoopGeoResolver),
        };

        tracing::info!(
            mail = ?config.mail.backend,
            sms = ?config.sms.backend,
            idps = idps.len(),
            geo = config.geoip.enabled,
            "provider registry ready"
        );
        Ok(Self { mailer, sms, idps, geo })
    }

    pub fn idp(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.idps.get(name).cloned()
    }

    pub fn idp_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.idps.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_log_backends_and_no_idps() {
        let registry = ProviderRegistry::from_config(&ProvidersConfig::default()).unwrap();
        assert!(registry.idp_names().is_empty());
        assert!(registry.idp("google").is_none());
    }
}
