// Webhook client notifier

use async_trait::async_trait;
use keyrelay_core::error::{AppError, Result};
use keyrelay_core::port::{ClientNotifier, NotifyError};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Serialize)]
struct Delivery<'a> {
    email: &'a str,
    account_key: &'a str,
}

/// POSTs `{"email", "account_key"}` to a fixed URL
pub struct WebhookClientNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookClientNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ClientNotifier for WebhookClientNotifier {
    async fn send_account_key(&self, email: &str, account_key: &str) -> std::result::Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Delivery { email, account_key })
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Delivery(format!("client answered {}", status)));
        }

        info!("Account key sent to ClientApplication for user {}", email);
        Ok(())
    }
}
