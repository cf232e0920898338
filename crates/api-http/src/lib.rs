//! HTTP API Layer
//!
//! Resource API for user records plus a health endpoint, served with axum.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::ApiHandler;
pub use server::{router, HttpServer, HttpServerConfig};
