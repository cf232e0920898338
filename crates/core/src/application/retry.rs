// Retry logic: bounded exponential backoff
use crate::domain::Job;
use crate::port::TimeProvider;
use std::sync::Arc;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(i64),
    /// Attempt budget used up; the job must not run again
    Exhausted,
}

/// Retry policy
///
/// Determines if a failed job should run again based on:
/// - Attempts already made (counted when the job was popped)
/// - Maximum attempts allowed
/// - Backoff factor for exponential delay
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
    base_delay_ms: i64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for computing the next run time
    /// * `base_delay_ms` - Delay before the first retry (default: 1000)
    ///
    /// # Example
    /// ```text
    /// let policy = RetryPolicy::new(Arc::new(SystemTimeProvider), 1000);
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, base_delay_ms: i64) -> Self {
        Self {
            time_provider,
            base_delay_ms,
        }
    }

    /// Determine if a failed job should be retried
    ///
    /// Returns:
    /// - `RetryDecision::Retry(delay_ms)` if attempts remain
    /// - `RetryDecision::Exhausted` once `attempts >= max_attempts`
    ///
    /// Backoff formula:
    /// delay = base_delay * (backoff_factor ^ (attempts - 1)) * jitter
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if job.is_exhausted() {
            warn!(
                job_id = %job.id,
                attempts = %job.attempts,
                max_attempts = %job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        let exponent = (job.attempts - 1).max(0);
        let base_delay_ms = self.base_delay_ms as f64 * job.backoff_factor.powi(exponent);

        // ±10% jitter seeded by job.id so retries of many jobs spread out
        // while a single job's schedule stays deterministic
        let jitter_seed = job.id.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        let delay_ms = (base_delay_ms * jitter_factor) as i64;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            max_attempts = %job.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }

    /// Put a failed job back in the queue after `delay_ms`
    pub fn prepare_for_retry(
        &self,
        job: &mut Job,
        delay_ms: i64,
        error: &str,
    ) -> crate::domain::error::Result<()> {
        let run_at = self.time_provider.now_millis() + delay_ms;
        job.requeue(run_at, error)?;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            run_at = %run_at,
            "Job prepared for retry"
        );
        Ok(())
    }
}
