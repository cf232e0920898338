// Simulated key authority: no network, fails at random

use async_trait::async_trait;
use keyrelay_core::domain::{redact_account_key, UserId};
use keyrelay_core::port::{KeyFetchError, KeyFetcher};
use rand::Rng;
use tracing::{info, warn};

/// Share of attempts that succeed by default
pub const DEFAULT_SUCCESS_RATIO: f64 = 0.5;

const FAKE_KEY_PREFIX: &str = "fake_account_key-";
const FAKE_KEY_RANDOM_BYTES: usize = 20;

pub struct SimulatedKeyFetcher {
    success_ratio: f64,
}

impl SimulatedKeyFetcher {
    /// `success_ratio` is clamped to `0.0..=1.0`; NaN falls back to the default
    pub fn new(success_ratio: f64) -> Self {
        let success_ratio = if success_ratio.is_nan() {
            DEFAULT_SUCCESS_RATIO
        } else {
            success_ratio.clamp(0.0, 1.0)
        };
        Self { success_ratio }
    }

    fn fake_key() -> String {
        let bytes: [u8; FAKE_KEY_RANDOM_BYTES] = rand::thread_rng().gen();
        format!("{}{}", FAKE_KEY_PREFIX, hex::encode(bytes))
    }
}

impl Default for SimulatedKeyFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_RATIO)
    }
}

#[async_trait]
impl KeyFetcher for SimulatedKeyFetcher {
    async fn fetch_account_key(&self, user_id: &UserId) -> Result<Option<String>, KeyFetchError> {
        let succeeded = rand::thread_rng().gen_bool(self.success_ratio);

        if !succeeded {
            warn!(user_id = %user_id, "Simulated key authority unavailable");
            return Err(KeyFetchError::ServiceUnavailable(
                "simulated key authority unavailable".to_string(),
            ));
        }

        let key = Self::fake_key();
        info!(
            user_id = %user_id,
            account_key = %redact_account_key(&key),
            "Simulated key authority issued account key"
        );
        Ok(Some(key))
    }
}
