// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error("Invalid job state: {0}")]
    UnknownJobState(String),

    #[error("Invalid job args: {0}")]
    InvalidJobArgs(String),

    #[error("Invalid account key: {0}")]
    InvalidAccountKey(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
