//! HTTP Request/Response Types

use keyrelay_core::application::QueueCounts;
use keyrelay_core::domain::{User, UserDraft};
use serde::{Deserialize, Serialize};

/// POST /api/users
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user: UserDraft,
}

/// Public view of a user; the password digest is never serialized
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub email: String,
    pub phone_number: String,
    pub full_name: Option<String>,
    pub key: String,
    pub account_key: Option<String>,
    pub metadata: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            phone_number: user.phone_number,
            full_name: user.full_name,
            key: user.key,
            account_key: user.account_key,
            metadata: user.metadata,
        }
    }
}

/// GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub jobs: QueueCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub errors: Vec<String>,
}
