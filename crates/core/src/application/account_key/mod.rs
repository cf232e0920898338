// Account key pipeline: acquisition, client notification, backfill

pub mod acquire;
pub mod backfill;
pub mod error;
pub mod notify;

pub use acquire::AccountKeyAcquirer;
pub use backfill::{BackfillScheduler, MissingAccountKeySweep, MAX_USERS_PER_RUN};
pub use error::AcquisitionError;
pub use notify::ClientNotificationHandler;
