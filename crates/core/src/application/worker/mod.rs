// Worker - Job execution loop

pub mod constants;
pub mod exhaustion;
pub mod handler;
mod shutdown;

use constants::*;
pub use exhaustion::{ExhaustedJob, ExhaustionHandler, LoggingExhaustionHandler};
pub use handler::{HandlerRegistry, JobHandler, JobOutcome};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::Job;
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Worker pulls jobs from one queue and runs them through their handlers
pub struct Worker {
    queue: String,
    job_repo: Arc<dyn JobRepository>,
    handlers: Arc<HandlerRegistry>,
    retry_policy: Arc<RetryPolicy>,
    exhaustion: Arc<dyn ExhaustionHandler>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        queue: impl Into<String>,
        job_repo: Arc<dyn JobRepository>,
        handlers: Arc<HandlerRegistry>,
        retry_policy: Arc<RetryPolicy>,
        exhaustion: Arc<dyn ExhaustionHandler>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            queue: queue.into(),
            job_repo,
            handlers,
            retry_policy,
            exhaustion,
            time_provider,
        }
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!("Worker started for queue: {}", self.queue);
        loop {
            if shutdown.is_shutdown() {
                info!("Worker shutting down for queue: {}", self.queue);
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Worker error: {}", e);
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker stopped for queue: {}", self.queue);
        Ok(())
    }

    /// Process jobs until none is due; returns how many attempts ran
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut processed = 0;
        while self.process_next_job().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Process next job from queue (returns true if job was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        // Pop next job (already atomically set to RUNNING, attempt counted)
        let mut job = match self.job_repo.pop_next(&self.queue).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        let handler = match self.handlers.get(job.kind) {
            Some(h) => h,
            None => {
                let reason = format!("No handler registered for job kind {}", job.kind);
                error!(job_id = %job.id, kind = %job.kind, "{}", reason);
                job.fail(self.time_provider.now_millis(), reason);
                self.job_repo.update(&job).await?;
                return Ok(true);
            }
        };

        info!(
            job_id = %job.id,
            kind = %job.kind,
            attempt = job.attempts,
            "Processing job"
        );

        // Each attempt runs in its own task so a panicking handler cannot take
        // the worker down; the panic surfaces through the JoinHandle
        let args = job.args.clone();
        let attempt = job.attempts;
        let handle = tokio::task::spawn(async move { handler.perform(&args, attempt).await });

        match handle.await {
            Ok(JobOutcome::Success) => {
                job.complete(self.time_provider.now_millis())?;
                info!(job_id = %job.id, kind = %job.kind, "Job completed");
                self.job_repo.update(&job).await?;
            }
            Ok(JobOutcome::RetryableFailure(reason)) => {
                self.retry_or_exhaust(&mut job, &reason).await?;
            }
            Ok(JobOutcome::FatalFailure(reason)) => {
                error!(
                    job_id = %job.id,
                    kind = %job.kind,
                    error = %reason,
                    "Job failed permanently"
                );
                job.fail(self.time_provider.now_millis(), reason);
                self.job_repo.update(&job).await?;
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("Job panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    "Job cancelled".to_string()
                };
                error!(job_id = %job.id, kind = %job.kind, "{}", reason);
                self.retry_or_exhaust(&mut job, &reason).await?;
            }
        }

        Ok(true)
    }

    async fn retry_or_exhaust(&self, job: &mut Job, reason: &str) -> Result<()> {
        match self.retry_policy.should_retry(job) {
            RetryDecision::Retry(delay_ms) => {
                warn!(
                    job_id = %job.id,
                    attempt = %job.attempts,
                    delay_ms = %delay_ms,
                    error = %reason,
                    "Retrying job after failure"
                );
                self.retry_policy.prepare_for_retry(job, delay_ms, reason)?;
                self.job_repo.update(job).await?;
            }
            RetryDecision::Exhausted => {
                job.fail(self.time_provider.now_millis(), reason);
                self.job_repo.update(job).await?;
                self.exhaustion
                    .on_exhausted(&ExhaustedJob::from_job(job, reason));
            }
        }
        Ok(())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
