//! Managed servers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::ServerId;

/// Last-known reachability of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
    Unknown,
}

impl ServerStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Up => "up",
            ServerStatus::Down => "down",
            ServerStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(ServerStatus::Up),
            "down" => Ok(ServerStatus::Down),
            "unknown" => Ok(ServerStatus::Unknown),
            other => Err(CoreError::UnknownVariant {
                kind: "server status",
                value: other.to_string(),
            }),
        }
    }
}

/// A managed host.
///
/// `status` and `last_probe_at` are only ever changed by an explicit probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    /// `host:port`, or a bare host to be probed on the configured port.
    pub address: String,
    pub status: ServerStatus,
    pub last_probe_at: Option<i64>,
    pub created_at: i64,
}

impl Server {
    /// A freshly registered server: never probed, status unknown.
    pub fn new(name: impl Into<String>, address: impl Into<String>, now: i64) -> Self {
        Self {
            id: ServerId::generate(),
            name: name.into(),
            address: address.into(),
            status: ServerStatus::Unknown,
            last_probe_at: None,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_server_is_unprobed() {
        let server = Server::new("web-1", "10.0.0.5:22", 1000);
        assert_eq!(server.status, ServerStatus::Unknown);
        assert!(server.last_probe_at.is_none());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("up".parse::<ServerStatus>().unwrap(), ServerStatus::Up);
        assert!("UP".parse::<ServerStatus>().is_err());
    }
}
