// Account key acquisition outcomes other than success

use crate::domain::UserId;
use thiserror::Error;
use tracing::{error, info, warn, Level};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("User {0} not found")]
    NotFound(UserId),

    #[error("User {0} already has an account key")]
    AlreadySatisfied(UserId),

    #[error("Key authority returned no account key for user {0}")]
    FetchIncomplete(UserId),

    #[error("Key authority unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AcquisitionError {
    /// Whether the job should fail and let the worker schedule another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AcquisitionError::NotFound(_) | AcquisitionError::AlreadySatisfied(_)
        )
    }

    pub fn level(&self) -> Level {
        match self {
            AcquisitionError::NotFound(_) | AcquisitionError::AlreadySatisfied(_) => Level::INFO,
            AcquisitionError::FetchIncomplete(_) => Level::WARN,
            AcquisitionError::ServiceUnavailable(_) | AcquisitionError::Unexpected(_) => {
                Level::ERROR
            }
        }
    }

    /// Emit this outcome at its own severity
    pub fn log(&self, user_id: &str) {
        match self.level() {
            Level::INFO => info!(user_id = %user_id, "{}", self),
            Level::WARN => warn!(user_id = %user_id, "{}", self),
            _ => error!(user_id = %user_id, "{}", self),
        }
    }
}
