// User Service - registration and listing behind the Resource API

use crate::application::queue::JobQueue;
use crate::domain::{User, UserDraft, UserFilter};
use crate::error::{AppError, Result};
use crate::port::{CredentialHasher, IdProvider, KeyProvider, TimeProvider, UserRepository};
use std::sync::Arc;
use tracing::{error, info};

/// Query parameters accepted by the listing endpoint
pub const PERMITTED_FILTER_PARAMS: [&str; 3] = ["email", "full_name", "metadata"];

/// Build a filter from raw query parameters.
///
/// Any parameter outside [`PERMITTED_FILTER_PARAMS`] is rejected, naming
/// each offender once in order of first appearance.
pub fn parse_filter(params: &[(String, String)]) -> Result<UserFilter> {
    let mut unexpected: Vec<String> = Vec::new();
    let mut email = None;
    let mut full_name = None;
    let mut metadata = None;

    for (name, value) in params {
        match name.as_str() {
            "email" => email = Some(value.clone()),
            "full_name" => full_name = Some(value.clone()),
            "metadata" => metadata = Some(value.clone()),
            other => {
                if !unexpected.iter().any(|u| u == other) {
                    unexpected.push(other.to_string());
                }
            }
        }
    }

    if !unexpected.is_empty() {
        return Err(AppError::UnexpectedParameters(unexpected));
    }

    Ok(UserFilter::new(email, full_name, metadata))
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    jobs: Arc<JobQueue>,
    hasher: Arc<dyn CredentialHasher>,
    id_provider: Arc<dyn IdProvider>,
    key_provider: Arc<dyn KeyProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        jobs: Arc<JobQueue>,
        hasher: Arc<dyn CredentialHasher>,
        id_provider: Arc<dyn IdProvider>,
        key_provider: Arc<dyn KeyProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            user_repo,
            jobs,
            hasher,
            id_provider,
            key_provider,
            time_provider,
        }
    }

    /// Validate and store a new user, then enqueue account key acquisition.
    ///
    /// All field errors are returned together as `AppError::InvalidRecord`.
    /// A failed enqueue does not undo the registration; the backfill sweep
    /// picks the user up later.
    pub async fn register(&self, draft: UserDraft) -> Result<User> {
        let mut draft = draft.normalize();
        if draft.key.is_none() {
            draft.key = Some(self.key_provider.generate_key());
        }

        let mut errors = draft.validate();

        let email = draft.email.clone().unwrap_or_default();
        let phone_number = draft.phone_number.clone().unwrap_or_default();
        let key = draft.key.clone().unwrap_or_default();

        for field in self.user_repo.taken_fields(&email, &phone_number, &key).await? {
            errors.push(field.taken_message());
        }

        if !errors.is_empty() {
            return Err(AppError::InvalidRecord(errors));
        }

        let password = draft.password.as_deref().unwrap_or_default();
        let now = self.time_provider.now_millis();
        let user = User {
            id: self.id_provider.generate_id(),
            email,
            phone_number,
            full_name: draft.full_name,
            password_digest: self.hasher.hash(password)?,
            key,
            account_key: None,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };

        // A concurrent registration can still win the race past taken_fields
        match self.user_repo.insert(&user).await {
            Ok(()) => {}
            Err(AppError::Conflict(message)) => return Err(AppError::InvalidRecord(vec![message])),
            Err(e) => return Err(e),
        }

        info!(user_id = %user.id, "User created");

        if let Err(e) = self.jobs.enqueue_fetch_account_key(&user.id).await {
            error!(
                user_id = %user.id,
                error = %e,
                "Failed to enqueue account key fetch; backfill will retry"
            );
        }

        Ok(user)
    }

    /// Users matching `filter`, most recent first
    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<User>> {
        self.user_repo.list(filter).await
    }
}
