// Backfill: re-enqueue acquisition for users still missing an account key

use crate::application::queue::JobQueue;
use crate::application::worker::{JobHandler, JobOutcome, ShutdownToken};
use crate::domain::{JobArgs, JobKind};
use crate::error::Result;
use crate::port::UserRepository;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Users handled per sweep; the rest wait for the next run
pub const MAX_USERS_PER_RUN: usize = 100;

pub struct MissingAccountKeySweep {
    user_repo: Arc<dyn UserRepository>,
    jobs: Arc<JobQueue>,
    batch_size: usize,
}

impl MissingAccountKeySweep {
    pub fn new(user_repo: Arc<dyn UserRepository>, jobs: Arc<JobQueue>) -> Self {
        Self {
            user_repo,
            jobs,
            batch_size: MAX_USERS_PER_RUN,
        }
    }

    /// Enqueue one acquisition job per user lacking a key, up to the batch size.
    ///
    /// Duplicate jobs for the same user are harmless; acquisition skips users
    /// that already have a key.
    pub async fn sweep(&self) -> Result<usize> {
        let user_ids = self.user_repo.ids_without_account_key(self.batch_size).await?;

        for user_id in &user_ids {
            self.jobs.enqueue_fetch_account_key(user_id).await?;
        }

        info!("Finished! Processed {} user(s).", user_ids.len());
        Ok(user_ids.len())
    }
}

#[async_trait]
impl JobHandler for MissingAccountKeySweep {
    fn kind(&self) -> JobKind {
        JobKind::FixMissingAccountKeys
    }

    async fn perform(&self, _args: &JobArgs, _attempt: i32) -> JobOutcome {
        match self.sweep().await {
            Ok(_) => JobOutcome::Success,
            Err(e) => {
                error!(error = %e, "Backfill sweep failed");
                JobOutcome::RetryableFailure(e.to_string())
            }
        }
    }
}

/// Periodically enqueues a sweep job
///
/// The sweep runs as a regular job so that any worker can pick it up.
pub struct BackfillScheduler {
    jobs: Arc<JobQueue>,
    every: Duration,
}

impl BackfillScheduler {
    pub fn new(jobs: Arc<JobQueue>, every: Duration) -> Self {
        Self { jobs, every }
    }

    /// Run until shutdown. The first sweep is enqueued immediately.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(interval_secs = self.every.as_secs(), "Backfill scheduler started");

        let mut tick = interval(self.every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.jobs.enqueue_fix_missing_account_keys().await {
                        Ok(job_id) => info!(job_id = %job_id, "Backfill sweep enqueued"),
                        Err(e) => error!(error = %e, "Failed to enqueue backfill sweep"),
                    }
                }
                _ = shutdown.wait() => {
                    info!("Backfill scheduler stopped");
                    break;
                }
            }
        }
    }
}
