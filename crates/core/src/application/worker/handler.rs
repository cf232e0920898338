// Job Handlers - per-kind units of work executed by the Worker

use crate::domain::{JobArgs, JobKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of one job attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Work finished (or was safely skipped); the job is done
    Success,
    /// Attempt failed; the worker may run the job again within its budget
    RetryableFailure(String),
    /// Attempt failed and must not be retried
    FatalFailure(String),
}

/// Handler for one job kind
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    /// Run one attempt. `attempt` starts at 1.
    async fn perform(&self, args: &JobArgs, attempt: i32) -> JobOutcome;
}

/// Maps job kinds to their handlers
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own kind, replacing any previous one
    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<JobKind> {
        self.handlers.keys().copied().collect()
    }
}
