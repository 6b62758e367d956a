//! Error types for dayplan
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, duplicate or missing task)
//! - 4: Operation failed (store IO, lock, notifier, prompt)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the dayplan CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for dayplan operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task already exists: {title} at {when}")]
    DuplicateTask { title: String, when: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed task store {path}: {source}")]
    MalformedStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Store watch failed: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::DuplicateTask { .. }
            | Error::TaskNotFound(_) => exit_codes::USER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::MalformedStore { .. }
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::Notify(_)
            | Error::Prompt(_)
            | Error::Watch(_) => exit_codes::OPERATION_FAILED,
        }
    }
}

/// Result type alias for dayplan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        let details = match err {
            Error::DuplicateTask { title, when } => Some(serde_json::json!({
                "title": title,
                "when": when,
            })),
            Error::MalformedStore { path, .. } | Error::LockFailed(path) => {
                Some(serde_json::json!({ "path": path }))
            }
            _ => None,
        };
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details,
        }
    }
}
