//! Error types for the exec module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while registering or running scripts.
#[derive(Debug, Error)]
pub enum ExecError {
    /// No script is registered under this key. Nothing was spawned.
    #[error("unknown script: {0}")]
    UnknownScript(String),

    /// The script ran and exited unsuccessfully.
    ///
    /// `exit_code` is `None` when the child was terminated by a signal.
    #[error("script {key} failed with exit code {exit_code:?}")]
    ScriptFailed {
        key: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// The script exceeded its time budget and was killed.
    #[error("script {key} timed out after {timeout:?}")]
    ScriptTimedOut {
        key: String,
        timeout: Duration,
        output: String,
    },

    /// The child process could not be started.
    #[error("failed to spawn script: {0}")]
    Spawn(#[source] std::io::Error),

    /// Reading the child's output or waiting on it failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A registry entry was rejected at startup.
    #[error("invalid script registration: {0}")]
    InvalidRegistration(String),
}

/// Result type for exec operations.
pub type Result<T> = std::result::Result<T, ExecError>;
