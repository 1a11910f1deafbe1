//! Error types for the Visitguard service.
//!
//! The rate limiter itself is total and never fails; these cover the
//! service around it.

use thiserror::Error;

/// Main error type for Visitguard operations.
#[derive(Error, Debug)]
pub enum VisitguardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for VisitguardError {
    fn from(err: config::ConfigError) -> Self {
        VisitguardError::Config(err.to_string())
    }
}

/// Result type alias for Visitguard operations.
pub type Result<T> = std::result::Result<T, VisitguardError>;
