//! Generic OAuth2 authorization-code adapter.
//!
//! One instance per configured provider; Google/GitHub/enterprise IdPs
//! differ only in endpoints and in how the userinfo document spells its
//! fields, so a single adapter with tolerant field mapping covers them.

use std::time::Duration;

use serde::Deserialize;

use agw_domain::config::IdpConfig;
use agw_domain::{Error, Result};

use crate::traits::{ExternalProfile, IdentityProvider};
use crate::util::{check_status, upstream_err, with_retries};

pub struct OAuth2Provider {
    client: reqwest::Client,
    config: IdpConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl OAuth2Provider {
    pub fn new(config: IdpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("idp client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn fetch_token(&self, code: &str) -> Result<String> {
        let service = format!("idp:{}", self.config.name);
        let response = self
            .client
            .post(&self.config.token_url)
            .header("accept", "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| upstream_err(&service, e))?;
        check_status(&service, &response)?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| upstream_err(&service, e))?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile> {
        let service = format!("idp:{}", self.config.name);
        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| upstream_err(&service, e))?;
        check_status(&service, &response)?;

        let doc: serde_json::Value = response
            .json()
            .await
            .map_err(|e| upstream_err(&service, e))?;

        // OIDC spells it `sub`; GitHub-style APIs use a numeric `id`.
        let subject = doc
            .get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| doc.get("id").map(|v| v.to_string().trim_matches('"').to_string()))
            .ok_or_else(|| Error::Upstream {
                service: service.clone(),
                message: "userinfo document has no subject".into(),
            })?;

        Ok(ExternalProfile {
            provider: self.config.name.clone(),
            subject,
            email: doc.get("email").and_then(|v| v.as_str()).map(str::to_string),
            email_verified: doc
                .get("email_verified")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            name: doc.get("name").and_then(|v| v.as_str()).map(str::to_string),
            avatar_url: doc
                .get("picture")
                .or_else(|| doc.get("avatar_url"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for OAuth2Provider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn authorize_url(&self, state: &str) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.config.auth_url,
            urlencode(&self.config.client_id),
            urlencode(&self.config.redirect_url),
            urlencode(state),
        );
        if !self.config.scopes.is_empty() {
            url.push_str("&scope=");
            url.push_str(&urlencode(&self.config.scopes.join(" ")));
        }
        url
    }

    async fn exchange(&self, code: &str) -> Result<ExternalProfile> {
        let token = with_retries("idp", || self.fetch_token(code)).await?;
        with_retries("idp", || self.fetch_profile(&token)).await
    }
}

/// Query-component percent-encoding, enough for client ids, URLs and
/// state values.
fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OAuth2Provider {
        OAuth2Provider::new(IdpConfig {
            name: "acme".into(),
            client_id: "client-1".into(),
            client_secret: "shh".into(),
            auth_url: "https://idp.test/authorize".into(),
            token_url: "https://idp.test/token".into(),
            userinfo_url: "https://idp.test/userinfo".into(),
            scopes: vec!["openid".into(), "email".into()],
            redirect_url: "https://gw.test/api/auth/acme/callback".into(),
            timeout_secs: 10,
        })
        .unwrap()
    }

    #[test]
    fn authorize_url_carries_state_and_scopes() {
        let url = provider().authorize_url("state-123");
        assert!(url.starts_with("https://idp.test/authorize?response_type=code"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("scope=openid%20email"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fgw.test"));
    }
}
