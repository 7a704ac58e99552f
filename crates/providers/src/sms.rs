use std::time::Duration;

use agw_domain::config::SmsConfig;
use agw_domain::{Error, Result};

use crate::traits::SmsSender;
use crate::util::{check_status, upstream_err, with_retries};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP relay sender
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpSms {
    client: reqwest::Client,
    url: String,
    api_key: String,
    sender_id: String,
}

impl HttpSms {
    pub fn new(config: &SmsConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::Config("sms.url is required for the http backend".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("sms client: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SmsSender for HttpSms {
    async fn send(&self, to: &str, body: &str) -> Result<String> {
        with_retries("sms", || async {
            let response = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&serde_json::json!({
                    "sender": self.sender_id,
                    "to": to,
                    "body": body,
                }))
                .send()
                .await
                .map_err(|e| upstream_err("sms", e))?;
            check_status("sms", &response)?;

            let parsed: serde_json::Value =
                response.json().await.map_err(|e| upstream_err("sms", e))?;
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
// Log sender (development)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LogSms;

#[async_trait::async_trait]
impl SmsSender for LogSms {
    async fn send(&self, to: &str, _body: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(to, message_id = %id, "sms delivery (log backend)");
        Ok(id)
    }
}
