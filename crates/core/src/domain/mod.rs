// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod user;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobArgs, JobId, JobKind, JobState, QueueId};
pub use user::{redact_account_key, UniqueField, User, UserDraft, UserFilter, UserId};
