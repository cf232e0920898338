// Key Fetcher Port
// Abstraction over the external authority that issues account keys

use crate::domain::UserId;
use async_trait::async_trait;
use thiserror::Error;

/// Failures of a single fetch attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyFetchError {
    /// Authority down or overloaded; always worth retrying
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Authority answered but refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Key Fetcher trait
///
/// Implementations:
/// - SimulatedKeyFetcher: random failures, no network
/// - HttpKeyFetcher: calls a real key authority over HTTP
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Perform one fetch attempt for a user known to exist without a key.
    ///
    /// `Ok(None)` (or an empty string) means the authority answered without
    /// issuing a key; the caller treats that as incomplete and retries.
    async fn fetch_account_key(&self, user_id: &UserId) -> Result<Option<String>, KeyFetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted result of one mock fetch
    #[derive(Debug, Clone)]
    pub enum MockFetch {
        /// Return this key
        Key(String),
        /// Answer without a key
        Empty,
        /// Fail with ServiceUnavailable
        Unavailable,
        /// Panic (for isolation testing)
        Panic(String),
    }

    /// Mock Key Fetcher: replays a script, then repeats the fallback
    pub struct MockKeyFetcher {
        script: Mutex<VecDeque<MockFetch>>,
        fallback: MockFetch,
        calls: Mutex<Vec<UserId>>,
    }

    impl MockKeyFetcher {
        pub fn new(script: Vec<MockFetch>, fallback: MockFetch) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn new_returning(key: impl Into<String>) -> Self {
            Self::new(Vec::new(), MockFetch::Key(key.into()))
        }

        pub fn new_unavailable() -> Self {
            Self::new(Vec::new(), MockFetch::Unavailable)
        }

        pub fn new_empty() -> Self {
            Self::new(Vec::new(), MockFetch::Empty)
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<UserId> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl KeyFetcher for MockKeyFetcher {
        async fn fetch_account_key(
            &self,
            user_id: &UserId,
        ) -> Result<Option<String>, KeyFetchError> {
            self.calls.lock().unwrap().push(user_id.clone());

            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match next {
                MockFetch::Key(key) => Ok(Some(key)),
                MockFetch::Empty => Ok(None),
                MockFetch::Unavailable => Err(KeyFetchError::ServiceUnavailable(
                    "mock authority unavailable".to_string(),
                )),
                MockFetch::Panic(msg) => panic!("{}", msg),
            }
        }
    }
}
