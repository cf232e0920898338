// Job Queue - enqueue side of the background pipeline

use crate::domain::{Job, JobArgs, JobId, JobKind, JobState, UserId};
use crate::error::Result;
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Default queue shared by all job kinds
pub const DEFAULT_QUEUE: &str = "default";

/// Attempts allowed per job kind before exhaustion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptBudgets {
    pub fetch_account_key: i32,
    pub send_account_key_to_client: i32,
    pub fix_missing_account_keys: i32,
}

impl AttemptBudgets {
    pub fn for_kind(&self, kind: JobKind) -> i32 {
        match kind {
            JobKind::FetchAccountKey => self.fetch_account_key,
            JobKind::SendAccountKeyToClient => self.send_account_key_to_client,
            JobKind::FixMissingAccountKeys => self.fix_missing_account_keys,
        }
    }
}

impl Default for AttemptBudgets {
    fn default() -> Self {
        Self {
            fetch_account_key: JobKind::FetchAccountKey.default_max_attempts(),
            send_account_key_to_client: JobKind::SendAccountKeyToClient.default_max_attempts(),
            fix_missing_account_keys: JobKind::FixMissingAccountKeys.default_max_attempts(),
        }
    }
}

/// Job counts for one queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub queued: i64,
    pub running: i64,
    pub done: i64,
    pub failed: i64,
}

/// Fire-and-forget enqueueing of typed jobs
pub struct JobQueue {
    queue: String,
    job_repo: Arc<dyn JobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    budgets: AttemptBudgets,
}

impl JobQueue {
    pub fn new(
        queue: impl Into<String>,
        job_repo: Arc<dyn JobRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue: queue.into(),
            job_repo,
            id_provider,
            time_provider,
            budgets: AttemptBudgets::default(),
        }
    }

    /// Override the per-kind attempt budgets
    pub fn with_budgets(mut self, budgets: AttemptBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn name(&self) -> &str {
        &self.queue
    }

    /// Enqueue a job of `kind` with positional `args`
    pub async fn enqueue(&self, kind: JobKind, args: JobArgs) -> Result<JobId> {
        let job_id = self.id_provider.generate_id();
        let created_at = self.time_provider.now_millis();

        let mut job = Job::new(job_id.clone(), created_at, self.queue.clone(), kind, args);
        job.max_attempts = self.budgets.for_kind(kind);

        self.job_repo.insert(&job).await?;

        debug!(
            job_id = %job_id,
            kind = %kind,
            max_attempts = job.max_attempts,
            "Job enqueued"
        );

        Ok(job_id)
    }

    pub async fn enqueue_fetch_account_key(&self, user_id: &UserId) -> Result<JobId> {
        self.enqueue(JobKind::FetchAccountKey, JobArgs::from_strs(&[user_id.as_str()]))
            .await
    }

    pub async fn enqueue_send_account_key(&self, email: &str, account_key: &str) -> Result<JobId> {
        self.enqueue(
            JobKind::SendAccountKeyToClient,
            JobArgs::from_strs(&[email, account_key]),
        )
        .await
    }

    pub async fn enqueue_fix_missing_account_keys(&self) -> Result<JobId> {
        self.enqueue(JobKind::FixMissingAccountKeys, JobArgs::empty())
            .await
    }

    /// Job counts by state for this queue
    pub async fn counts(&self) -> Result<QueueCounts> {
        Ok(QueueCounts {
            queued: self.job_repo.count_by_state(&self.queue, JobState::Queued).await?,
            running: self.job_repo.count_by_state(&self.queue, JobState::Running).await?,
            done: self.job_repo.count_by_state(&self.queue, JobState::Done).await?,
            failed: self.job_repo.count_by_state(&self.queue, JobState::Failed).await?,
        })
    }
}
