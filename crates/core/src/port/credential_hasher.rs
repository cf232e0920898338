// Credential Hasher Port

use crate::error::Result;

/// One-way hashing of user credential secrets
pub trait CredentialHasher: Send + Sync {
    /// Hash a secret into a self-describing digest string
    fn hash(&self, secret: &str) -> Result<String>;

    /// Check a secret against a stored digest
    fn verify(&self, secret: &str, digest: &str) -> Result<bool>;
}

pub mod mocks {
    use super::*;

    /// Reversible "hash" for tests that do not care about the digest
    pub struct FakeCredentialHasher;

    impl CredentialHasher for FakeCredentialHasher {
        fn hash(&self, secret: &str) -> Result<String> {
            Ok(format!("fake${}", secret.len()))
        }

        fn verify(&self, secret: &str, digest: &str) -> Result<bool> {
            Ok(digest == format!("fake${}", secret.len()))
        }
    }
}
