// keyrelay Infrastructure - External Adapters
// Implements: KeyFetcher (simulated, HTTP), ClientNotifier (logging, webhook), CredentialHasher (argon2)

mod argon2_hasher;
mod http_fetcher;
mod logging_notifier;
mod simulated_fetcher;
mod webhook_notifier;

pub use argon2_hasher::Argon2CredentialHasher;
pub use http_fetcher::{HttpKeyFetcher, DEFAULT_FETCH_TIMEOUT};
pub use logging_notifier::LoggingClientNotifier;
pub use simulated_fetcher::{SimulatedKeyFetcher, DEFAULT_SUCCESS_RATIO};
pub use webhook_notifier::WebhookClientNotifier;

#[cfg(test)]
pub(crate) mod test_server;
