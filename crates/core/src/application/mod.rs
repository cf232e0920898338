// Application Layer - Use Cases and Business Logic

pub mod account_key;
pub mod queue;
pub mod recovery;
pub mod retry;
pub mod users;
pub mod worker;

// Re-exports
pub use account_key::{
    AccountKeyAcquirer, AcquisitionError, BackfillScheduler, ClientNotificationHandler,
    MissingAccountKeySweep,
};
pub use queue::{AttemptBudgets, JobQueue, QueueCounts, DEFAULT_QUEUE};
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPolicy};
pub use users::{parse_filter, UserService};
pub use worker::{
    shutdown_channel, ExhaustionHandler, HandlerRegistry, JobHandler, JobOutcome,
    LoggingExhaustionHandler, ShutdownSender, ShutdownToken, Worker,
};
