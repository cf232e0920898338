// Job Domain Model

use super::error::{DomainError, Result};
use super::user::redact_account_key;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Queue identifier
pub type QueueId = String;

/// Job State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            other => Err(DomainError::UnknownJobState(other.to_string())),
        }
    }
}

/// Kind of background work; selects the handler and the default attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Acquire the account key for one user. Args: `[user_id]`
    FetchAccountKey,
    /// Relay an acquired key to the client application. Args: `[email, account_key]`
    SendAccountKeyToClient,
    /// Re-enqueue acquisition for users still missing a key. Args: `[]`
    FixMissingAccountKeys,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FetchAccountKey => "fetch_account_key",
            JobKind::SendAccountKeyToClient => "send_account_key_to_client",
            JobKind::FixMissingAccountKeys => "fix_missing_account_keys",
        }
    }

    /// Attempts allowed before the job is declared exhausted
    pub fn default_max_attempts(&self) -> i32 {
        match self {
            JobKind::FetchAccountKey => 3,
            JobKind::SendAccountKeyToClient => 1,
            JobKind::FixMissingAccountKeys => 1,
        }
    }

    /// Positions in the args array holding secrets
    fn secret_arg_positions(&self) -> &'static [usize] {
        match self {
            JobKind::SendAccountKeyToClient => &[1],
            _ => &[],
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fetch_account_key" => Ok(JobKind::FetchAccountKey),
            "send_account_key_to_client" => Ok(JobKind::SendAccountKeyToClient),
            "fix_missing_account_keys" => Ok(JobKind::FixMissingAccountKeys),
            other => Err(DomainError::UnknownJobKind(other.to_string())),
        }
    }
}

/// Positional job arguments, stored as a JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobArgs(serde_json::Value);

impl JobArgs {
    pub fn new(values: Vec<serde_json::Value>) -> Self {
        Self(serde_json::Value::Array(values))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn from_strs(values: &[&str]) -> Self {
        Self::new(
            values
                .iter()
                .map(|v| serde_json::Value::String(v.to_string()))
                .collect(),
        )
    }

    /// Wrap a stored value; anything other than an array is rejected
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_array() {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidJobArgs(format!(
                "expected a JSON array, got {}",
                value
            )))
        }
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.as_array().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// String argument at `index`
    pub fn str_at(&self, index: usize) -> Result<&str> {
        self.0
            .get(index)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DomainError::InvalidJobArgs(format!("missing string argument at position {}", index))
            })
    }

    /// Render for logs with secret positions masked
    pub fn redacted(&self, kind: JobKind) -> String {
        let secret_positions = kind.secret_arg_positions();
        match self.0.as_array() {
            Some(values) if !secret_positions.is_empty() => {
                let masked: Vec<serde_json::Value> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| match v.as_str() {
                        Some(s) if secret_positions.contains(&i) => {
                            serde_json::Value::String(redact_account_key(s))
                        }
                        _ => v.clone(),
                    })
                    .collect();
                serde_json::Value::Array(masked).to_string()
            }
            _ => self.0.to_string(),
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: QueueId,
    pub kind: JobKind,
    pub args: JobArgs,
    pub state: JobState,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    /// Earliest time the job may be popped (epoch ms)
    pub run_at: i64,

    // Retry bookkeeping
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_factor: f64,
    pub last_error: Option<String>,
}

impl Job {
    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter for deterministic test IDs (test-1, test-2, ...).
    /// Timestamps start at 1000 and increment by 1000.
    ///
    /// **Note**: This method should only be used in tests. For production code,
    /// always inject ID and time via providers.
    pub fn new_test(queue: impl Into<String>, kind: JobKind, args: JobArgs) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(id, created_at, queue, kind, args)
    }

    /// Create a new Job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `queue` - Queue name
    /// * `kind` - Job kind
    /// * `args` - Positional arguments
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        kind: JobKind,
        args: JobArgs,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            kind,
            args,
            state: JobState::Queued,
            created_at,
            started_at: None,
            finished_at: None,
            run_at: created_at,
            attempts: 0,
            max_attempts: kind.default_max_attempts(),
            backoff_factor: 2.0,
            last_error: None,
        }
    }

    /// Transition to Running state, counting the attempt
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: "RUNNING".to_string(),
            });
        }
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        self.attempts += 1;
        Ok(())
    }

    /// Transition to Done state with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: "DONE".to_string(),
            });
        }
        self.state = JobState::Done;
        self.finished_at = Some(now_millis);
        self.last_error = None;
        Ok(())
    }

    /// Put a running job back in the queue, not before `run_at`
    pub fn requeue(&mut self, run_at: i64, error: impl Into<String>) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: "QUEUED".to_string(),
            });
        }
        self.state = JobState::Queued;
        self.started_at = None;
        self.run_at = run_at;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Mark as Failed (terminal) with explicit timestamp
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.finished_at = Some(now_millis);
        self.last_error = Some(error.into());
    }

    /// True when no attempts remain in the budget
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_round_trips_through_str() {
        for kind in [
            JobKind::FetchAccountKey,
            JobKind::SendAccountKeyToClient,
            JobKind::FixMissingAccountKeys,
        ] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("unknown".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_new_job_uses_kind_budget() {
        let job = Job::new_test("default", JobKind::FetchAccountKey, JobArgs::from_strs(&["u1"]));
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.run_at, job.created_at);

        let notify = Job::new_test(
            "default",
            JobKind::SendAccountKeyToClient,
            JobArgs::from_strs(&["a@b.c", "tok"]),
        );
        assert_eq!(notify.max_attempts, 1);
    }

    #[test]
    fn test_lifecycle_counts_attempts_until_exhausted() {
        let mut job = Job::new("job-1", 1000, "default", JobKind::FetchAccountKey, JobArgs::empty());

        for attempt in 1..=3 {
            job.start(1000 * attempt as i64).unwrap();
            assert_eq!(job.attempts, attempt);
            if attempt < 3 {
                assert!(!job.is_exhausted());
                job.requeue(5000, "boom").unwrap();
                assert_eq!(job.state, JobState::Queued);
                assert!(job.started_at.is_none());
            }
        }

        assert!(job.is_exhausted());
        job.fail(9000, "boom");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let mut job = Job::new("job-2", 1000, "default", JobKind::FetchAccountKey, JobArgs::empty());
        assert!(job.complete(2000).is_err());
        assert!(job.requeue(2000, "x").is_err());
        job.start(2000).unwrap();
        assert!(job.start(3000).is_err());
    }

    #[test]
    fn test_args_accessors() {
        let args = JobArgs::from_strs(&["user-1"]);
        assert_eq!(args.str_at(0).unwrap(), "user-1");
        assert!(args.str_at(1).is_err());
        assert_eq!(args.len(), 1);
        assert!(JobArgs::empty().is_empty());
        assert!(JobArgs::from_value(serde_json::json!({"a": 1})).is_err());
    }

    #[test]
    fn test_redacted_masks_account_key_only() {
        let args = JobArgs::from_strs(&["jane@example.com", "fake_account_key-deadbeef"]);
        let rendered = args.redacted(JobKind::SendAccountKeyToClient);
        assert_eq!(rendered, r#"["jane@example.com","xxxxxxbeef"]"#);

        let fetch = JobArgs::from_strs(&["user-1"]);
        assert_eq!(fetch.redacted(JobKind::FetchAccountKey), r#"["user-1"]"#);
    }
}
