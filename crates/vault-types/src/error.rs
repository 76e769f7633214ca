//! Error types for vault-ops.

use thiserror::Error;

/// Unified error type for vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path is absolute, escapes the vault root, or is not a note
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
