// Client Notifier Port
// Delivers acquired account keys to the downstream client application

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait ClientNotifier: Send + Sync {
    /// Hand one (email, account key) pair to the client application
    async fn send_account_key(&self, email: &str, account_key: &str) -> Result<(), NotifyError>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every delivery; optionally fails all of them
    pub struct RecordingClientNotifier {
        deliveries: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingClientNotifier {
        pub fn new() -> Self {
            Self {
                deliveries: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub fn new_failing() -> Self {
            Self {
                deliveries: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn deliveries(&self) -> Vec<(String, String)> {
            self.deliveries.lock().unwrap().clone()
        }
    }

    impl Default for RecordingClientNotifier {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ClientNotifier for RecordingClientNotifier {
        async fn send_account_key(&self, email: &str, account_key: &str) -> Result<(), NotifyError> {
            self.deliveries
                .lock()
                .unwrap()
                .push((email.to_string(), account_key.to_string()));

            if self.fail {
                return Err(NotifyError::Delivery("mock client unreachable".to_string()));
            }
            Ok(())
        }
    }
}
