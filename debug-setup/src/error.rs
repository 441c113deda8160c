//! Error types for the debug-setup MCP server

use std::time::Duration;
use thiserror::Error;

/// Main error type for the debug-setup MCP server
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Failed to persist configuration: {0}")]
    Persistence(String),

    #[error("Configuration generation failed: {0}")]
    Generation(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Command timed out after {0:?}")]
    CommandTimeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for SetupError {
    fn from(error: toml::de::Error) -> Self {
        SetupError::Settings(error.to_string())
    }
}

impl From<toml::ser::Error> for SetupError {
    fn from(error: toml::ser::Error) -> Self {
        SetupError::Settings(error.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SetupError>;
