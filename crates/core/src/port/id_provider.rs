// ID Provider Port (for deterministic testing)

use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::user::MAX_KEY_LENGTH;

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique ID
    fn generate_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential IDs with a prefix (`user-1`, `user-2`, ...)
pub struct SequentialIdProvider {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdProvider for SequentialIdProvider {
    fn generate_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// Opaque key generator for new users
pub trait KeyProvider: Send + Sync {
    fn generate_key(&self) -> String;
}

/// Random hex key filling the maximum key length
pub struct RandomKeyProvider;

impl KeyProvider for RandomKeyProvider {
    fn generate_key(&self) -> String {
        // hex doubles the length, so draw half as many bytes
        let mut bytes = vec![0u8; MAX_KEY_LENGTH / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
