// Stub client notifier: records the delivery in the log only

use async_trait::async_trait;
use keyrelay_core::port::{ClientNotifier, NotifyError};
use tracing::info;

pub struct LoggingClientNotifier;

#[async_trait]
impl ClientNotifier for LoggingClientNotifier {
    async fn send_account_key(&self, email: &str, _account_key: &str) -> Result<(), NotifyError> {
        info!("Account key sent to ClientApplication for user {}", email);
        Ok(())
    }
}
