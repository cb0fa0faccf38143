//! Custom error types for the quickstart CLI.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Service '{0}' is not running")]
    ServiceNotRunning(String),

    #[error("Docker Compose is not available: {0}")]
    ComposeUnavailable(String),

    #[error("Command `{command}` failed with status {status}")]
    CommandFailed { command: String, status: i32 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Preset '{name}' not found. Available presets: {available}")]
    PresetNotFound { name: String, available: String },

    #[error("Invalid preset '{0}': {1}")]
    InvalidPreset(String, String),

    #[error("Backup directory not found: {0}")]
    BackupNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Another operation is already in progress for site '{site}' (lock file: {lock_path})")]
    Locked { site: String, lock_path: String },
}

pub type Result<T> = std::result::Result<T, StackError>;
