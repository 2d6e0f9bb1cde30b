//! Audit log entries and the hash chain that links them.
//!
//! An entry is built in two steps. The recorder fills in an [`AuditDraft`]
//! describing what happened; the store then assigns the sequence number,
//! timestamp and predecessor hash under its write lock and seals the draft
//! into an [`AuditLogEntry`]. Sealing computes `entry_hash` over the
//! canonical encoding of every other field, so any later edit to a stored
//! row breaks the chain at that row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::actor::{Actor, Role};
use crate::canonical::canonical_entry_bytes;
use crate::error::{CoreError, Result};
use crate::types::ActorId;

/// Domain separation context for entry hashes.
const ENTRY_HASH_CONTEXT: &str = "opsdeck 2024-06 audit entry v1";

/// Kind of sensitive action being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
    Ping,
    Script,
}

impl AuditAction {
    pub const ALL: [AuditAction; 6] = [
        AuditAction::Create,
        AuditAction::Read,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::Ping,
        AuditAction::Script,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Read => "read",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Ping => "ping",
            AuditAction::Script => "script",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "audit action",
                value: s.to_string(),
            })
    }
}

/// The type of resource an entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Credential,
    Server,
    User,
}

impl ResourceType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Credential => "Credential",
            ResourceType::Server => "Server",
            ResourceType::User => "User",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Credential" => Ok(ResourceType::Credential),
            "Server" => Ok(ResourceType::Server),
            "User" => Ok(ResourceType::User),
            other => Err(CoreError::UnknownVariant {
                kind: "resource type",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether the recorded operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditOutcome::Success),
            "failure" => Ok(AuditOutcome::Failure),
            other => Err(CoreError::UnknownVariant {
                kind: "audit outcome",
                value: other.to_string(),
            }),
        }
    }
}

/// A 32-byte BLAKE3 link in the audit chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainHash(pub [u8; 32]);

impl ChainHash {
    /// Predecessor of the first entry.
    pub const GENESIS: Self = Self([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::EncodingError(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::EncodingError("chain hash must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({})", &self.to_hex()[..16])
    }
}

/// An audit record before the store has placed it in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    pub actor_id: ActorId,
    pub actor_name: String,
    pub actor_role: Role,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub origin: Option<String>,
    pub outcome: AuditOutcome,
    pub detail: serde_json::Value,
}

impl AuditDraft {
    pub fn new(
        actor: &Actor,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            actor_role: actor.role,
            action,
            resource_type,
            resource_id: resource_id.into(),
            origin: None,
            outcome: AuditOutcome::Success,
            detail: serde_json::Value::Null,
        }
    }

    pub fn origin(mut self, origin: Option<std::net::IpAddr>) -> Self {
        self.origin = origin.map(|ip| ip.to_string());
        self
    }

    pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    /// Place the draft in the chain and compute its hash.
    pub fn seal(self, seq: u64, timestamp: i64, prev_hash: ChainHash) -> Result<AuditLogEntry> {
        let mut entry = AuditLogEntry {
            seq,
            timestamp,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            actor_role: self.actor_role,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            origin: self.origin,
            outcome: self.outcome,
            detail: self.detail,
            prev_hash,
            entry_hash: ChainHash::GENESIS,
        };
        entry.entry_hash = entry.compute_hash()?;
        Ok(entry)
    }
}

/// An immutable record of one sensitive action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Position in the trail, starting at 1.
    pub seq: u64,
    /// Server-assigned time of the append (Unix ms).
    pub timestamp: i64,
    pub actor_id: ActorId,
    pub actor_name: String,
    pub actor_role: Role,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub origin: Option<String>,
    pub outcome: AuditOutcome,
    pub detail: serde_json::Value,
    pub prev_hash: ChainHash,
    pub entry_hash: ChainHash,
}

impl AuditLogEntry {
    /// Recompute the hash of this entry from its fields.
    pub fn compute_hash(&self) -> Result<ChainHash> {
        let bytes = canonical_entry_bytes(self)?;
        let mut hasher = blake3::Hasher::new_derive_key(ENTRY_HASH_CONTEXT);
        hasher.update(&bytes);
        Ok(ChainHash(*hasher.finalize().as_bytes()))
    }
}

/// Read-only filter over the audit trail. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    pub actor_id: Option<ActorId>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<String>,
    /// Inclusive lower bound (Unix ms).
    pub since: Option<i64>,
    /// Exclusive upper bound (Unix ms).
    pub until: Option<i64>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor_id: ActorId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn resource(mut self, resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn between(mut self, since: i64, until: i64) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an entry passes every filter (ignores `limit`).
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.actor_id.map_or(true, |id| entry.actor_id == id)
            && self.action.map_or(true, |a| entry.action == a)
            && self.resource_type.map_or(true, |t| entry.resource_type == t)
            && self
                .resource_id
                .as_deref()
                .map_or(true, |id| entry.resource_id == id)
            && self.since.map_or(true, |t| entry.timestamp >= t)
            && self.until.map_or(true, |t| entry.timestamp < t)
    }
}

/// Result of walking the whole chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub entries: u64,
    /// First sequence number whose hash or link does not verify.
    pub first_broken: Option<u64>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// Verify a complete trail, given in sequence order.
pub fn verify_chain<'a, I>(entries: I) -> Result<ChainReport>
where
    I: IntoIterator<Item = &'a AuditLogEntry>,
{
    let mut prev = ChainHash::GENESIS;
    let mut expected_seq = 1u64;
    let mut count = 0u64;
    let mut first_broken = None;

    for entry in entries {
        count += 1;
        if first_broken.is_none() {
            let linked = entry.prev_hash == prev && entry.seq == expected_seq;
            if !linked || entry.compute_hash()? != entry.entry_hash {
                first_broken = Some(entry.seq);
            }
        }
        prev = entry.entry_hash;
        expected_seq = entry.seq + 1;
    }

    Ok(ChainReport {
        entries: count,
        first_broken,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> Actor {
        Actor::new(ActorId::from_bytes([7; 16]), "alice", Role::Admin)
    }

    fn chain(n: u64) -> Vec<AuditLogEntry> {
        let mut prev = ChainHash::GENESIS;
        (1..=n)
            .map(|seq| {
                let entry = AuditDraft::new(
                    &actor(),
                    AuditAction::Read,
                    ResourceType::Credential,
                    format!("cred-{}", seq),
                )
                .detail(serde_json::json!({ "n": seq }))
                .seal(seq, 1_000 + seq as i64, prev)
                .unwrap();
                prev = entry.entry_hash;
                entry
            })
            .collect()
    }

    #[test]
    fn test_seal_is_deterministic() {
        let a = chain(1);
        let b = chain(1);
        assert_eq!(a[0].entry_hash, b[0].entry_hash);
    }

    #[test]
    fn test_intact_chain_verifies() {
        let entries = chain(5);
        let report = verify_chain(&entries).unwrap();
        assert_eq!(report.entries, 5);
        assert!(report.is_intact());
    }

    #[test]
    fn test_edited_entry_breaks_chain() {
        let mut entries = chain(5);
        entries[2].resource_id = "cred-other".into();
        let report = verify_chain(&entries).unwrap();
        assert_eq!(report.first_broken, Some(3));
    }

    #[test]
    fn test_removed_entry_breaks_chain() {
        let mut entries = chain(4);
        entries.remove(1);
        let report = verify_chain(&entries).unwrap();
        assert_eq!(report.first_broken, Some(3));
    }

    #[test]
    fn test_query_matches() {
        let entry = &chain(1)[0];
        assert!(AuditQuery::all().matches(entry));
        assert!(AuditQuery::all()
            .resource(ResourceType::Credential, "cred-1")
            .matches(entry));
        assert!(!AuditQuery::all().action(AuditAction::Delete).matches(entry));
        assert!(!AuditQuery::all().between(0, 1_001).matches(entry));
        assert!(AuditQuery::all().between(1_001, 1_002).matches(entry));
    }

    #[test]
    fn test_outcome_display_matches_stored_text() {
        for outcome in [AuditOutcome::Success, AuditOutcome::Failure] {
            assert_eq!(outcome.to_string(), outcome.as_str());
            assert_eq!(outcome.to_string().parse::<AuditOutcome>().unwrap(), outcome);
        }
    }

    #[test]
    fn test_action_parse_roundtrip() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_rewritten_name_breaks_the_chain_at_that_entry(
                len in 1u64..12,
                pick in any::<prop::sample::Index>(),
                name in "[a-z]{1,12}",
            ) {
                let mut trail = chain(len);
                let victim = pick.index(trail.len());
                prop_assume!(trail[victim].actor_name != name);
                trail[victim].actor_name = name;

                let report = verify_chain(&trail).unwrap();
                prop_assert_eq!(report.entries, len);
                prop_assert_eq!(report.first_broken, Some(victim as u64 + 1));
            }
        }
    }
}
