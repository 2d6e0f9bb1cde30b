//! Error types for the console.

use std::io;
use std::time::Duration;

use opsdeck_core::ResourceType;
use opsdeck_exec::{ExecError, ScriptOutput};
use opsdeck_perms::PermsError;
use opsdeck_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by console operations.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The actor's role may not perform this operation.
    #[error("forbidden")]
    Forbidden,

    /// The referenced record does not exist.
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: ResourceType,
        id: String,
    },

    /// A stored secret could not be opened.
    #[error("stored secret could not be decrypted")]
    Decryption,

    /// No script is registered under the requested key.
    #[error("unknown script: {0}")]
    UnknownScript(String),

    /// The script ran and failed. Captured output is preserved.
    #[error("script {key} failed with exit code {exit_code:?}")]
    ScriptExecution {
        key: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// The script was killed after exceeding its time budget.
    #[error("script {key} timed out after {timeout:?}")]
    ScriptTimeout {
        key: String,
        timeout: Duration,
        output: String,
    },

    /// The audit entry for a completed action could not be written.
    ///
    /// `rolled_back` says whether the action's effect was undone.
    #[error("audit write failed (rolled back: {rolled_back}): {source}")]
    AuditWrite {
        #[source]
        source: StoreError,
        rolled_back: bool,
    },

    /// A script ran but its audit entry could not be written.
    ///
    /// A run cannot be undone, so `run` keeps what the script produced:
    /// its output on success, or the typed failure with captured output.
    #[error("audit write failed after running script {key}: {source}")]
    ScriptAuditWrite {
        key: String,
        #[source]
        source: StoreError,
        run: Box<std::result::Result<ScriptOutput, ConsoleError>>,
    },

    /// Request input was rejected before anything happened.
    #[error("validation error: {0}")]
    Validation(String),

    /// A record with the same id already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The script process could not be started or read.
    #[error("failed to run script: {0}")]
    Spawn(#[source] io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ConsoleError {
    pub(crate) fn not_found(resource_type: ResourceType, id: impl ToString) -> Self {
        ConsoleError::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }
}

impl From<PermsError> for ConsoleError {
    fn from(err: PermsError) -> Self {
        match err {
            PermsError::Forbidden => ConsoleError::Forbidden,
            PermsError::Decryption(_) => ConsoleError::Decryption,
            PermsError::SecretTooLarge { len, max } => ConsoleError::Validation(format!(
                "secret is {} bytes, limit is {}",
                len, max
            )),
            PermsError::Encryption(reason) => ConsoleError::Validation(reason),
            PermsError::InvalidKey(reason) => ConsoleError::Config(ConfigError::InvalidKey(reason)),
        }
    }
}

impl From<ExecError> for ConsoleError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::UnknownScript(key) => ConsoleError::UnknownScript(key),
            ExecError::ScriptFailed {
                key,
                exit_code,
                output,
            } => ConsoleError::ScriptExecution {
                key,
                exit_code,
                output,
            },
            ExecError::ScriptTimedOut {
                key,
                timeout,
                output,
            } => ConsoleError::ScriptTimeout {
                key,
                timeout,
                output,
            },
            ExecError::Spawn(e) | ExecError::Io(e) => ConsoleError::Spawn(e),
            ExecError::InvalidRegistration(reason) => {
                ConsoleError::Config(ConfigError::Scripts(reason))
            }
        }
    }
}

/// Result type for console operations.
pub type Result<T> = std::result::Result<T, ConsoleError>;
