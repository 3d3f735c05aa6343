//! Structured error types for the referral CLI

use thiserror::Error;
use lib_referral::ReferralError;
use lib_storage::StorageError;

#[derive(Error, Debug)]
pub enum CliError {
    // Engine
    #[error(transparent)]
    Referral(#[from] ReferralError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // Arguments
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    // Configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoadFailed { path: String, reason: String },

    #[error("Home directory not found")]
    HomeDirectoryNotFound,

    // I/O operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // Serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        CliError::InvalidArgument { name, reason: reason.into() }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Other(err.to_string())
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
