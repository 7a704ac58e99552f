use std::time::Duration;

use agw_domain::config::MailConfig;
use agw_domain::{Error, Result};

use crate::traits::Mailer;
use crate::util::{check_status, upstream_err, with_retries};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP relay mailer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POSTs `{from, to, subject, body}` to the configured mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::Config("mail.url is required for the http backend".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("mail client: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        with_retries("mail", || async {
            let response = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&serde_json::json!({
                    "from": self.from,
                    "to": to,
                    "subject": subject,
                    "body": body,
                }))
                .send()
                .await
                .map_err(|e| upstream_err("mail", e))?;
            check_status("mail", &response)?;

            let parsed: serde_json::Value = response
                .json()
                .await
                .map_err(|e| upstream_err("mail", e))?;
            Ok(parsed
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string())
        })
        .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Log mailer (development)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logs the delivery instead of sending. The body is deliberately kept
/// out of the log line; OTP codes must not end up in log storage.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(to, subject, message_id = %id, "mail delivery (log backend)");
        Ok(id)
    }
}
