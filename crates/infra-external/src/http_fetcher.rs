// HTTP key authority client

use async_trait::async_trait;
use keyrelay_core::domain::{redact_account_key, UserId};
use keyrelay_core::error::{AppError, Result};
use keyrelay_core::port::{KeyFetchError, KeyFetcher};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct FetchRequest<'a> {
    user_id: &'a str,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    account_key: Option<String>,
}

/// Calls `POST {base_url}/account_keys` once per fetch
pub struct HttpKeyFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpKeyFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/account_keys", base_url.trim_end_matches('/')),
        })
    }
}

/// Outage-like statuses are worth retrying; the rest are refusals
fn classify_status(status: StatusCode) -> KeyFetchError {
    let message = format!("key authority answered {}", status);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        KeyFetchError::ServiceUnavailable(message)
    } else {
        KeyFetchError::Rejected(message)
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch_account_key(&self, user_id: &UserId) -> std::result::Result<Option<String>, KeyFetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&FetchRequest { user_id })
            .send()
            .await
            .map_err(|e| {
                warn!(user_id = %user_id, error = %e, "Key authority request failed");
                KeyFetchError::ServiceUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(user_id = %user_id, status = %status, "Key authority refused fetch");
            return Err(classify_status(status));
        }

        let body: FetchResponse = response
            .json()
            .await
            .map_err(|e| KeyFetchError::Rejected(format!("invalid key authority response: {}", e)))?;

        match &body.account_key {
            Some(key) if !key.is_empty() => info!(
                user_id = %user_id,
                account_key = %redact_account_key(key),
                "Key authority issued account key"
            ),
            _ => warn!(user_id = %user_id, "Key authority answered without an account key"),
        }

        Ok(body.account_key)
    }
}
