//! # vault-types
//!
//! Shared settings and domain types for vault-ops.
//!
//! - `Settings`: layered configuration (defaults, config file, env, CLI)
//! - `VaultError`: error type for vault file operations
//! - `MaintenanceTask`: names of the housekeeping jobs

pub mod config;
pub mod error;
pub mod task;

pub use config::{AnswerProvider, AnswerSettings, EmbedderProvider, EmbedderSettings, Settings};
pub use error::VaultError;
pub use task::MaintenanceTask;
