//! Actors, roles and the per-request context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::ActorId;

/// The closed set of roles an actor can hold.
///
/// `Staff` exists so ordinary employees can be represented; it is granted
/// nothing in this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    SystemManager,
    TechnicalSupport,
    Staff,
}

impl Role {
    /// Every role, in descending privilege.
    pub const ALL: [Role; 4] = [
        Role::Admin,
        Role::SystemManager,
        Role::TechnicalSupport,
        Role::Staff,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::SystemManager => "SystemManager",
            Role::TechnicalSupport => "TechnicalSupport",
            Role::Staff => "Staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "role",
                value: s.to_string(),
            })
    }
}

/// An authenticated identity with exactly one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}

/// Everything the core needs to know about the request being served.
///
/// Built by the orchestration layer once authentication is done. The role
/// cannot change for the lifetime of the context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor: Actor,
    origin: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(actor: Actor, origin: Option<IpAddr>) -> Self {
        Self { actor, origin }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn role(&self) -> Role {
        self.actor.role
    }

    /// Originating network address, if the front proxy supplied one.
    pub fn origin(&self) -> Option<IpAddr> {
        self.origin
    }
}
