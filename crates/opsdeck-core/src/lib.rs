//! # opsdeck Core
//!
//! Pure domain model for the opsdeck secrets and privileged-operation core.
//!
//! This crate contains no I/O, no storage, no process handling. It defines
//! the records every other crate passes around and the hash chain that makes
//! the audit trail tamper-evident.
//!
//! ## Key Types
//!
//! - [`Actor`] / [`Role`] - The authenticated identity behind a request
//! - [`Credential`] - A stored secret entry, sealed at rest
//! - [`Server`] - A managed host with probe-derived status
//! - [`AuditLogEntry`] - One immutable, hash-chained audit record
//!
//! ## Audit Chain
//!
//! Every entry commits to its predecessor through [`ChainHash`]. See the
//! [`audit`] module for the hashing rules and [`canonical`] for the encoding.

pub mod actor;
pub mod audit;
pub mod canonical;
pub mod credential;
pub mod error;
pub mod server;
pub mod types;

pub use actor::{Actor, RequestContext, Role};
pub use audit::{
    verify_chain, AuditAction, AuditDraft, AuditLogEntry, AuditOutcome, AuditQuery, ChainHash,
    ChainReport, ResourceType,
};
pub use credential::{CreatorRef, Credential, CredentialFull, CredentialSummary, NewCredential};
pub use error::{CoreError, Result};
pub use server::{Server, ServerStatus};
pub use types::{now_millis, ActorId, CredentialId, SealedSecret, ServerId};
