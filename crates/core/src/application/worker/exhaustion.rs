// Exhaustion hook - invoked once when a job uses up its attempt budget

use crate::domain::{Job, JobArgs, JobId, JobKind};
use tracing::error;

/// What the hook sees about an exhausted job
#[derive(Debug, Clone, PartialEq)]
pub struct ExhaustedJob {
    pub job_id: JobId,
    pub kind: JobKind,
    pub args: JobArgs,
    pub attempts: i32,
    pub last_error: String,
}

impl ExhaustedJob {
    pub fn from_job(job: &Job, last_error: &str) -> Self {
        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            args: job.args.clone(),
            attempts: job.attempts,
            last_error: last_error.to_string(),
        }
    }
}

pub trait ExhaustionHandler: Send + Sync {
    fn on_exhausted(&self, exhausted: &ExhaustedJob);
}

/// Logs the terminal failure with the job's original arguments
pub struct LoggingExhaustionHandler;

impl ExhaustionHandler for LoggingExhaustionHandler {
    fn on_exhausted(&self, exhausted: &ExhaustedJob) {
        // TODO: forward exhausted jobs to an error tracker once one is configured
        error!(
            job_id = %exhausted.job_id,
            kind = %exhausted.kind,
            last_error = %exhausted.last_error,
            "Failed all ({}) retry attempts with args: {}",
            exhausted.attempts,
            exhausted.args.redacted(exhausted.kind)
        );
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every exhaustion record for assertions
    #[derive(Default)]
    pub struct RecordingExhaustionHandler {
        records: Mutex<Vec<ExhaustedJob>>,
    }

    impl RecordingExhaustionHandler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn records(&self) -> Vec<ExhaustedJob> {
            self.records.lock().unwrap().clone()
        }
    }

    impl ExhaustionHandler for RecordingExhaustionHandler {
        fn on_exhausted(&self, exhausted: &ExhaustedJob) {
            self.records.lock().unwrap().push(exhausted.clone());
        }
    }
}
