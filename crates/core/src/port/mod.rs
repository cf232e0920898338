// Port Layer - Interfaces for external dependencies

pub mod client_notifier;
pub mod credential_hasher;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod key_fetcher;
pub mod time_provider;
pub mod user_repository;

// Re-exports
pub use client_notifier::{ClientNotifier, NotifyError};
pub use credential_hasher::CredentialHasher;
pub use id_provider::{IdProvider, KeyProvider};
pub use job_repository::JobRepository;
pub use key_fetcher::{KeyFetchError, KeyFetcher};
pub use time_provider::TimeProvider;
pub use user_repository::{AccountKeyAssignment, UserRepository};
