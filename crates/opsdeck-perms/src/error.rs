//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur during authorization or sealing.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Policy denial. Deliberately carries no detail.
    #[error("forbidden")]
    Forbidden,

    /// Sealed value malformed, tampered with, or sealed under another key.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Plaintext exceeds the supported length.
    #[error("secret too large: {len} bytes (max {max})")]
    SecretTooLarge { len: usize, max: usize },

    /// Key material has the wrong shape.
    #[error("invalid cipher key: {0}")]
    InvalidKey(String),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
