// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Field-level validation failures, reported together
    #[error("Validation failed: {}", .0.join(", "))]
    InvalidRecord(Vec<String>),

    #[error("Unexpected parameter(s): {}", .0.join(", "))]
    UnexpectedParameters(Vec<String>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Messages suitable for an `{"errors": [...]}` response body
    pub fn messages(&self) -> Vec<String> {
        match self {
            AppError::InvalidRecord(messages) => messages.clone(),
            AppError::Conflict(message) => vec![message.clone()],
            other => vec![other.to_string()],
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database / AppError::Conflict

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_parameters_message_lists_all_names() {
        let err = AppError::UnexpectedParameters(vec!["page".to_string(), "sort".to_string()]);
        assert_eq!(err.to_string(), "Unexpected parameter(s): page, sort");
        assert_eq!(err.messages(), vec!["Unexpected parameter(s): page, sort"]);
    }

    #[test]
    fn test_invalid_record_messages_are_kept_separate() {
        let err = AppError::InvalidRecord(vec![
            "Email can't be blank".to_string(),
            "Password can't be blank".to_string(),
        ]);
        assert_eq!(err.messages().len(), 2);
        assert!(err.to_string().contains("Email can't be blank"));
    }
}
