//! HTTP Handlers
//!
//! Request handling for each route, independent of the router wiring.

use crate::error::ApiError;
use crate::types::{CreateUserRequest, HealthResponse, UserResponse};
use keyrelay_core::application::{parse_filter, JobQueue, UserService};
use std::sync::Arc;
use tracing::debug;

/// Handler with injected application services
pub struct ApiHandler {
    users: Arc<UserService>,
    jobs: Arc<JobQueue>,
}

impl ApiHandler {
    pub fn new(users: Arc<UserService>, jobs: Arc<JobQueue>) -> Self {
        Self { users, jobs }
    }

    /// POST /api/users
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ApiError> {
        let user = self.users.register(request.user).await?;
        Ok(UserResponse::from(user))
    }

    /// GET /api/users
    pub async fn list_users(
        &self,
        params: &[(String, String)],
    ) -> Result<Vec<UserResponse>, ApiError> {
        let filter = parse_filter(params)?;
        debug!(?filter, "Listing users");

        let users = self.users.list(&filter).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        Ok(HealthResponse {
            status: "ok",
            version: keyrelay_core::VERSION,
            jobs: self.jobs.counts().await?,
        })
    }
}
