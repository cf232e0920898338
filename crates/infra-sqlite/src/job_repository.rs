// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use keyrelay_core::domain::{Job, JobArgs, JobId, JobState};
use keyrelay_core::error::{AppError, Result};
use keyrelay_core::port::{JobRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, queue, kind, args, state,
                created_at, started_at, finished_at, run_at,
                attempts, max_attempts, backoff_factor, last_error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.queue)
        .bind(job.kind.as_str())
        .bind(job.args.as_value().to_string())
        .bind(job.state.to_string())
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.run_at)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.backoff_factor)
        .bind(&job.last_error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, finished_at = ?, run_at = ?,
                attempts = ?, max_attempts = ?, last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(job.state.to_string())
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.run_at)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(&job.last_error)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        // Single statement claim: two workers can never pop the same attempt
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = ? AND state = ? AND run_at <= ?
                ORDER BY run_at ASC, created_at ASC, id ASC
                LIMIT 1
            )
              AND state = ?
            RETURNING *
            "#,
        )
        .bind(JobState::Running.to_string())
        .bind(now)
        .bind(queue)
        .bind(JobState::Queued.to_string())
        .bind(now)
        .bind(JobState::Queued.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
                .bind(queue)
                .bind(state.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE state = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(state.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    kind: String,
    args: String,
    state: String,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    run_at: i64,
    attempts: i32,
    max_attempts: i32,
    backoff_factor: f64,
    last_error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let args: serde_json::Value = serde_json::from_str(&self.args)?;

        Ok(Job {
            id: self.id,
            queue: self.queue,
            kind: self.kind.parse()?,
            args: JobArgs::from_value(args)?,
            state: self.state.parse()?,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            run_at: self.run_at,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            backoff_factor: self.backoff_factor,
            last_error: self.last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use keyrelay_core::domain::JobKind;
    use keyrelay_core::port::time_provider::ManualTimeProvider;
    use std::collections::HashSet;

    async fn setup_test_db() -> (SqlitePool, Arc<ManualTimeProvider>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, Arc::new(ManualTimeProvider::new(10_000)))
    }

    fn job(id: &str, created_at: i64) -> Job {
        Job::new(
            id,
            created_at,
            "default",
            JobKind::FetchAccountKey,
            JobArgs::from_strs(&["u1"]),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (pool, clock) = setup_test_db().await;
        let repo = SqliteJobRepository::new(pool, clock);

        let original = Job::new(
            "j1",
            1_000,
            "default",
            JobKind::SendAccountKeyToClient,
            JobArgs::from_strs(&["a@example.com", "tok-123"]),
        );
        repo.insert(&original).await.unwrap();

        let found = repo.find_by_id(&"j1".to_string()).await.unwrap().unwrap();
        assert_eq!(found.kind, JobKind::SendAccountKeyToClient);
        assert_eq!(found.args, original.args);
        assert_eq!(found.state, JobState::Queued);
        assert_eq!(found.max_attempts, 1);
        assert_eq!(found.run_at, 1_000);
    }

    #[tokio::test]
    async fn test_pop_next_claims_oldest_due_job() {
        let (pool, clock) = setup_test_db().await;
        let repo = SqliteJobRepository::new(pool, clock.clone());

        let mut later = job("later", 1_000);
        later.run_at = 20_000;
        repo.insert(&later).await.unwrap();
        repo.insert(&job("second", 2_000)).await.unwrap();
        repo.insert(&job("first", 1_500)).await.unwrap();

        let popped = repo.pop_next("default").await.unwrap().unwrap();
        assert_eq!(popped.id, "first");
        assert_eq!(popped.state, JobState::Running);
        assert_eq!(popped.attempts, 1);
        assert_eq!(popped.started_at, Some(10_000));

        assert_eq!(repo.pop_next("default").await.unwrap().unwrap().id, "second");
        // "later" is not due yet
        assert!(repo.pop_next("default").await.unwrap().is_none());

        clock.advance(10_000);
        assert_eq!(repo.pop_next("default").await.unwrap().unwrap().id, "later");
        assert!(repo.pop_next("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_persists_retry_state() {
        let (pool, clock) = setup_test_db().await;
        let repo = SqliteJobRepository::new(pool, clock);
        repo.insert(&job("j1", 1_000)).await.unwrap();

        let mut popped = repo.pop_next("default").await.unwrap().unwrap();
        popped.requeue(15_000, "Key authority unavailable").unwrap();
        repo.update(&popped).await.unwrap();

        let stored = repo.find_by_id(&"j1".to_string()).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Queued);
        assert_eq!(stored.run_at, 15_000);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_error.as_deref(), Some("Key authority unavailable"));

        assert_eq!(repo.count_by_state("default", JobState::Queued).await.unwrap(), 1);
        assert_eq!(repo.count_by_state("default", JobState::Running).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_job_is_not_found() {
        let (pool, clock) = setup_test_db().await;
        let repo = SqliteJobRepository::new(pool, clock);

        let err = repo.update(&job("ghost", 1_000)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_by_state() {
        let (pool, clock) = setup_test_db().await;
        let repo = SqliteJobRepository::new(pool, clock);
        repo.insert(&job("a", 1_000)).await.unwrap();
        repo.insert(&job("b", 2_000)).await.unwrap();
        repo.pop_next("default").await.unwrap();

        let running = repo.find_by_state(JobState::Running).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "a");
        assert_eq!(repo.find_by_state(JobState::Queued).await.unwrap()[0].id, "b");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pops_never_share_a_job() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = Arc::new(SqliteJobRepository::new(
            pool,
            Arc::new(ManualTimeProvider::new(10_000)),
        ));

        for i in 0..40 {
            repo.insert(&job(&format!("j{:02}", i), i)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = repo.pop_next("default").await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 40);
        assert_eq!(unique.len(), 40);
    }
}
