use std::time::Duration;

use agw_domain::config::GeoConfig;

use crate::traits::{GeoInfo, GeoResolver};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP geo resolver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GETs `<url>/<ip>` and reads `country`/`region` from the JSON reply.
/// Lookup failures degrade to `None`; audit enrichment never fails a
/// request.
pub struct HttpGeoResolver {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpGeoResolver {
    pub fn new(config: &GeoConfig) -> Option<Self> {
        if !config.enabled || config.url.is_empty() {
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        // Private/loopback principals have no meaningful geography.
        if ip.starts_with("127.") || ip.starts_with("10.") || ip == "::1" {
            return None;
        }
        let response = self
            .client
            .get(format!("{}/{}", self.url, ip))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::debug!(ip, status = %response.status(), "geo lookup failed");
            return None;
        }
        let doc: serde_json::Value = response.json().await.ok()?;
        Some(GeoInfo {
            country: doc.get("country").and_then(|v| v.as_str()).map(str::to_string),
            region: doc.get("region").and_then(|v| v.as_str()).map(str::to_string),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// No-op resolver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct NoopGeoResolver;

#[async_trait::async_trait]
impl GeoResolver for NoopGeoResolver {
    async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
        None
    }
}
