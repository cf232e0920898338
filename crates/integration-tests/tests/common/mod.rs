//! Shared harness: the full job pipeline on a temporary SQLite file

#![allow(dead_code)]

use std::sync::Arc;

use keyrelay_core::application::worker::exhaustion::mocks::RecordingExhaustionHandler;
use keyrelay_core::application::{
    AccountKeyAcquirer, ClientNotificationHandler, HandlerRegistry, JobQueue,
    MissingAccountKeySweep, RetryPolicy, UserService, Worker, DEFAULT_QUEUE,
};
use keyrelay_core::domain::{Job, JobState, User};
use keyrelay_core::port::client_notifier::mocks::RecordingClientNotifier;
use keyrelay_core::port::credential_hasher::mocks::FakeCredentialHasher;
use keyrelay_core::port::id_provider::{RandomKeyProvider, SequentialIdProvider};
use keyrelay_core::port::key_fetcher::mocks::MockKeyFetcher;
use keyrelay_core::port::time_provider::ManualTimeProvider;
use keyrelay_core::port::{JobRepository, KeyFetcher, TimeProvider, UserRepository};
use keyrelay_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository, SqliteUserRepository};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Far beyond any backoff delay the tests schedule
pub const PAST_ANY_BACKOFF_MS: i64 = 10 * 60 * 1000;

pub struct Pipeline {
    pub pool: SqlitePool,
    pub clock: Arc<ManualTimeProvider>,
    pub users: Arc<SqliteUserRepository>,
    pub jobs: Arc<SqliteJobRepository>,
    pub queue: Arc<JobQueue>,
    pub user_service: Arc<UserService>,
    pub notifier: Arc<RecordingClientNotifier>,
    pub exhaustion: Arc<RecordingExhaustionHandler>,
    pub handlers: Arc<HandlerRegistry>,
    pub retry_policy: Arc<RetryPolicy>,
    _dir: TempDir,
}

impl Pipeline {
    pub async fn new(fetcher: MockKeyFetcher) -> Self {
        Self::with_fetcher(Arc::new(fetcher)).await
    }

    pub async fn with_fetcher(fetcher: Arc<dyn KeyFetcher>) -> Self {
        Self::build(fetcher, Arc::new(RecordingClientNotifier::new())).await
    }

    pub async fn build(
        fetcher: Arc<dyn KeyFetcher>,
        notifier: Arc<RecordingClientNotifier>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("keyrelay.db").display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let clock = Arc::new(ManualTimeProvider::new(START_MILLIS));
        let users = Arc::new(SqliteUserRepository::new(pool.clone()));
        let jobs = Arc::new(SqliteJobRepository::new(pool.clone(), clock.clone()));
        let queue = Arc::new(JobQueue::new(
            DEFAULT_QUEUE,
            jobs.clone(),
            Arc::new(SequentialIdProvider::new("job")),
            clock.clone(),
        ));

        let handlers = Arc::new(
            HandlerRegistry::new()
                .register(Arc::new(AccountKeyAcquirer::new(
                    users.clone(),
                    fetcher,
                    queue.clone(),
                    clock.clone(),
                )))
                .register(Arc::new(ClientNotificationHandler::new(notifier.clone())))
                .register(Arc::new(MissingAccountKeySweep::new(
                    users.clone(),
                    queue.clone(),
                ))),
        );

        let user_service = Arc::new(UserService::new(
            users.clone(),
            queue.clone(),
            Arc::new(FakeCredentialHasher),
            Arc::new(SequentialIdProvider::new("user")),
            Arc::new(RandomKeyProvider),
            clock.clone(),
        ));

        Self {
            pool,
            retry_policy: Arc::new(RetryPolicy::new(clock.clone(), 1_000)),
            clock,
            users,
            jobs,
            queue,
            user_service,
            notifier,
            exhaustion: Arc::new(RecordingExhaustionHandler::new()),
            handlers,
            _dir: dir,
        }
    }

    pub fn worker(&self) -> Worker {
        Worker::new(
            DEFAULT_QUEUE,
            self.jobs.clone(),
            self.handlers.clone(),
            self.retry_policy.clone(),
            self.exhaustion.clone(),
            self.clock.clone(),
        )
    }

    /// Run every due job, then jump past pending backoffs, until the queue
    /// has nothing left to run
    pub async fn drain(&self) -> usize {
        let worker = self.worker();
        let mut total = 0;
        loop {
            let ran = worker.run_until_idle().await.unwrap();
            total += ran;
            if self.jobs_in_state(JobState::Queued).await.is_empty() {
                return total;
            }
            self.clock.advance(PAST_ANY_BACKOFF_MS);
        }
    }

    /// Store a user directly, bypassing registration
    pub async fn seed_user(&self, id: &str, account_key: Option<&str>) -> User {
        let now = self.clock.now_millis();
        let user = User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            phone_number: format!("555-{}", id),
            full_name: None,
            password_digest: "digest".to_string(),
            key: format!("key-{}", id),
            account_key: account_key.map(str::to_string),
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(&user).await.unwrap();
        self.clock.advance(1);
        user
    }

    pub async fn user(&self, id: &str) -> User {
        self.users.find_by_id(&id.to_string()).await.unwrap().unwrap()
    }

    pub async fn jobs_in_state(&self, state: JobState) -> Vec<Job> {
        self.jobs.find_by_state(state).await.unwrap()
    }
}
