//! The fixed table of scripts an operator may run.
//!
//! A registry is assembled once at startup, from configuration or the
//! builder, and never changes afterwards. Callers only ever refer to a
//! script by its symbolic key; the program and arguments come from here.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ExecError, Result};

/// How to run one registered script: an absolute program plus fixed argv.
///
/// There is no shell in between; `args` are passed to the program as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ScriptSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Immutable key → script mapping.
#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    scripts: BTreeMap<String, ScriptSpec>,
}

impl ScriptRegistry {
    pub fn builder() -> ScriptRegistryBuilder {
        ScriptRegistryBuilder::default()
    }

    /// Build a registry from a configuration table, validating every entry.
    pub fn from_specs<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ScriptSpec)>,
    {
        specs
            .into_iter()
            .try_fold(Self::builder(), |builder, (key, spec)| {
                builder.register(key, spec)
            })
            .map(ScriptRegistryBuilder::build)
    }

    pub fn get(&self, key: &str) -> Option<&ScriptSpec> {
        self.scripts.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scripts.contains_key(key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

/// Collects and validates registrations before freezing them.
#[derive(Debug, Default)]
pub struct ScriptRegistryBuilder {
    scripts: BTreeMap<String, ScriptSpec>,
}

impl ScriptRegistryBuilder {
    /// Add a script.
    ///
    /// Rejects keys outside `[A-Za-z0-9_-]+`, relative programs and
    /// duplicate keys.
    pub fn register(mut self, key: impl Into<String>, spec: ScriptSpec) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        if !spec.program.is_absolute() {
            return Err(ExecError::InvalidRegistration(format!(
                "script {}: program must be an absolute path, got {}",
                key,
                spec.program.display()
            )));
        }
        if self.scripts.contains_key(&key) {
            return Err(ExecError::InvalidRegistration(format!(
                "script {} registered twice",
                key
            )));
        }
        self.scripts.insert(key, spec);
        Ok(self)
    }

    pub fn build(self) -> ScriptRegistry {
        ScriptRegistry {
            scripts: self.scripts,
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(ExecError::InvalidRegistration(format!(
            "invalid script key {:?}",
            key
        )))
    }
}
