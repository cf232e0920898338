// keyrelay Core - Domain Logic, Ports & Job Pipeline
// NO infrastructure dependencies (adapters live in the infra crates)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
