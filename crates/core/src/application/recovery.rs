// Crash recovery: jobs left RUNNING by a previous process
use crate::application::worker::{ExhaustedJob, ExhaustionHandler};
use crate::domain::JobState;
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

const RECOVERY_REASON: &str = "interrupted by daemon restart";

/// Crash recovery service
///
/// On daemon startup, puts jobs that were RUNNING when the daemon died back in
/// the queue. The interrupted attempt still counts against the budget.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    exhaustion: Arc<dyn ExhaustionHandler>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `job_repo` - Job repository
    /// * `exhaustion` - Hook for jobs whose interrupted attempt was their last
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        exhaustion: Arc<dyn ExhaustionHandler>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            job_repo,
            exhaustion,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Recover orphaned jobs
    ///
    /// 1. Find all RUNNING jobs with `started_at < now - recovery_window`
    /// 2. Attempts left: requeue, due immediately
    /// 3. Budget used up: mark FAILED and report through the exhaustion hook
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting orphaned job recovery"
        );

        let running_jobs = self.job_repo.find_by_state(JobState::Running).await?;
        let mut recovered_count = 0;

        for mut job in running_jobs {
            let orphaned = match job.started_at {
                Some(started_at) => started_at < cutoff,
                None => {
                    warn!(job_id = %job.id, "RUNNING job without started_at");
                    true
                }
            };
            if !orphaned {
                continue;
            }

            if job.is_exhausted() {
                job.fail(now, RECOVERY_REASON);
                self.job_repo.update(&job).await?;
                self.exhaustion
                    .on_exhausted(&ExhaustedJob::from_job(&job, RECOVERY_REASON));
            } else {
                job.requeue(now, RECOVERY_REASON)?;
                self.job_repo.update(&job).await?;
                info!(
                    job_id = %job.id,
                    kind = %job.kind,
                    attempts = job.attempts,
                    "Orphaned job requeued"
                );
            }
            recovered_count += 1;
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }
}
