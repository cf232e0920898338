// Account Key Acquisition - fetch, persist, hand off to the notifier

use super::error::AcquisitionError;
use crate::application::queue::JobQueue;
use crate::application::worker::{JobHandler, JobOutcome};
use crate::domain::user::validate_account_key;
use crate::domain::{redact_account_key, JobArgs, JobKind, UserId};
use crate::port::{AccountKeyAssignment, KeyFetchError, KeyFetcher, TimeProvider, UserRepository};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Acquires the account key for one user per invocation.
///
/// Safe to run repeatedly and concurrently for the same user: the key is only
/// written while absent, so duplicates converge on the first stored key.
pub struct AccountKeyAcquirer {
    user_repo: Arc<dyn UserRepository>,
    fetcher: Arc<dyn KeyFetcher>,
    jobs: Arc<JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
}

impl AccountKeyAcquirer {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        fetcher: Arc<dyn KeyFetcher>,
        jobs: Arc<JobQueue>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            user_repo,
            fetcher,
            jobs,
            time_provider,
        }
    }

    /// Returns the newly stored key
    pub async fn acquire(&self, user_id: &UserId) -> Result<String, AcquisitionError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| AcquisitionError::Unexpected(e.to_string()))?
            .ok_or_else(|| AcquisitionError::NotFound(user_id.clone()))?;

        if user.has_account_key() {
            return Err(AcquisitionError::AlreadySatisfied(user_id.clone()));
        }

        let account_key = match self.fetcher.fetch_account_key(user_id).await {
            Ok(Some(key)) if !key.trim().is_empty() => key,
            Ok(_) => return Err(AcquisitionError::FetchIncomplete(user_id.clone())),
            Err(KeyFetchError::ServiceUnavailable(msg)) => {
                return Err(AcquisitionError::ServiceUnavailable(msg))
            }
            Err(e @ KeyFetchError::Rejected(_)) => {
                return Err(AcquisitionError::Unexpected(e.to_string()))
            }
        };

        validate_account_key(&account_key).map_err(|e| AcquisitionError::Unexpected(e.to_string()))?;

        let now = self.time_provider.now_millis();
        let updated = match self
            .user_repo
            .assign_account_key(user_id, &account_key, now)
            .await
        {
            Ok(AccountKeyAssignment::Assigned(user)) => user,
            Ok(AccountKeyAssignment::AlreadyAssigned) => {
                return Err(AcquisitionError::AlreadySatisfied(user_id.clone()))
            }
            Ok(AccountKeyAssignment::UserMissing) => {
                return Err(AcquisitionError::NotFound(user_id.clone()))
            }
            Err(e) => return Err(AcquisitionError::Unexpected(e.to_string())),
        };

        info!(
            "Account key for user id: {} updated: {}",
            updated.id,
            redact_account_key(&account_key)
        );

        // The key is stored; a lost notification must not turn into a retry
        if let Err(e) = self
            .jobs
            .enqueue_send_account_key(&updated.email, &account_key)
            .await
        {
            error!(user_id = %updated.id, error = %e, "Failed to enqueue client notification");
        }

        Ok(account_key)
    }
}

#[async_trait]
impl JobHandler for AccountKeyAcquirer {
    fn kind(&self) -> JobKind {
        JobKind::FetchAccountKey
    }

    async fn perform(&self, args: &JobArgs, attempt: i32) -> JobOutcome {
        let user_id = match args.str_at(0) {
            Ok(id) => id.to_string(),
            Err(e) => return JobOutcome::FatalFailure(e.to_string()),
        };

        info!(attempt, "Fetch account key for user id: {} started", user_id);

        let outcome = match self.acquire(&user_id).await {
            Ok(_) => JobOutcome::Success,
            Err(e) => {
                e.log(&user_id);
                if e.is_retryable() {
                    JobOutcome::RetryableFailure(e.to_string())
                } else {
                    JobOutcome::Success
                }
            }
        };

        info!(attempt, "Fetch account key for user id: {} finished", user_id);
        outcome
    }
}
