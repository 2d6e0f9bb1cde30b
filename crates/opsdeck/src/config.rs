//! Console configuration.
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! cipher_key = "8f1c...64 hex chars..."
//! script_timeout_secs = 60
//! audit_output_limit = 2048
//!
//! [scripts.restartApp]
//! program = "/usr/bin/systemctl"
//! args = ["restart", "app"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroize;

use opsdeck_exec::{ExecLimits, ScriptRegistry, ScriptSpec};
use opsdeck_perms::CipherKey;

/// Errors raised while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no cipher key configured")]
    MissingKey,

    #[error("invalid cipher key: {0}")]
    InvalidKey(String),

    #[error("invalid script table: {0}")]
    Scripts(String),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for a [`Console`](crate::Console).
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// 256-bit cipher key, hex encoded. Cleared once the console is built.
    pub cipher_key: String,
    /// Registered maintenance scripts by key.
    pub scripts: BTreeMap<String, ScriptSpec>,
    pub script_timeout_secs: u64,
    pub drain_grace_ms: u64,
    /// Cap on captured script output (default: 1 MiB).
    pub max_output_bytes: usize,
    /// Cap on script output copied into an audit entry (default: 2048).
    pub audit_output_limit: usize,
    /// Port probed when a server address has none (default: 22).
    pub probe_port: u16,
    pub probe_timeout_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            cipher_key: String::new(),
            scripts: BTreeMap::new(),
            script_timeout_secs: 60,
            drain_grace_ms: 250,
            max_output_bytes: 1024 * 1024,
            audit_output_limit: 2048,
            probe_port: 22,
            probe_timeout_ms: 3000,
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            scripts = config.scripts.len(),
            "loaded console config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.script_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "script_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "probe_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_output_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_output_bytes",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn exec_limits(&self) -> ExecLimits {
        ExecLimits {
            timeout: self.script_timeout(),
            drain_grace: self.drain_grace(),
            max_output_bytes: self.max_output_bytes,
        }
    }

    pub fn script_registry(&self) -> Result<ScriptRegistry, ConfigError> {
        ScriptRegistry::from_specs(self.scripts.clone())
            .map_err(|e| ConfigError::Scripts(e.to_string()))
    }

    /// Parse the configured key and wipe the hex text.
    pub(crate) fn take_cipher_key(&mut self) -> Result<CipherKey, ConfigError> {
        if self.cipher_key.trim().is_empty() {
            return Err(ConfigError::MissingKey);
        }
        let key = CipherKey::from_hex(&self.cipher_key)
            .map_err(|e| ConfigError::InvalidKey(e.to_string()));
        self.cipher_key.zeroize();
        key
    }
}

impl fmt::Debug for ConsoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleConfig")
            .field("cipher_key", &"<redacted>")
            .field("scripts", &self.scripts)
            .field("script_timeout_secs", &self.script_timeout_secs)
            .field("drain_grace_ms", &self.drain_grace_ms)
            .field("max_output_bytes", &self.max_output_bytes)
            .field("audit_output_limit", &self.audit_output_limit)
            .field("probe_port", &self.probe_port)
            .field("probe_timeout_ms", &self.probe_timeout_ms)
            .finish()
    }
}
