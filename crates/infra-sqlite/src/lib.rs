// keyrelay Infrastructure - SQLite Adapter
// Implements: UserRepository, JobRepository

mod connection;
mod error;
mod job_repository;
mod migration;
mod user_repository;

pub use connection::create_pool;
pub use job_repository::SqliteJobRepository;
pub use migration::run_migrations;
pub use user_repository::SqliteUserRepository;

// Note: sqlx::Error conversion is handled by map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
