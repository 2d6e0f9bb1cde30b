//! # opsdeck
//!
//! Core of an internal operations console: an encrypted credential store,
//! a tamper-evident audit trail and a bounded executor for pre-registered
//! maintenance scripts, all behind one role-based access guard.
//!
//! ## Overview
//!
//! - **Credentials**: secrets are sealed with XChaCha20-Poly1305 before they
//!   reach storage; lists never carry them; every decrypted read is audited
//! - **Audit**: append-only, hash-chained, queryable and verifiable
//! - **Servers**: registration, TCP reachability probes, scripts by key
//! - **Access policy**: a static role table checked before anything else
//!
//! ## Usage
//!
//! ```rust,no_run
//! use opsdeck::{Console, ConsoleConfig};
//! use opsdeck::core::{Actor, ActorId, NewCredential, RequestContext, Role};
//! use opsdeck::store::SqliteStore;
//!
//! async fn example() {
//!     let config = ConsoleConfig::load("opsdeck.toml").unwrap();
//!     let store = SqliteStore::open("opsdeck.db").unwrap();
//!     let console = Console::new(store, config).unwrap();
//!
//!     let admin = Actor::new(ActorId::generate(), "root", Role::Admin);
//!     let ctx = RequestContext::new(admin, None);
//!
//!     let summary = console
//!         .create_credential(&ctx, NewCredential::new("postgres", "s3cr3t!"))
//!         .await
//!         .unwrap();
//!     let full = console.read_credential_secret(&ctx, &summary.id).await.unwrap();
//!     assert_eq!(full.secret, "s3cr3t!");
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `opsdeck::core` - records, identifiers and the audit chain
//! - `opsdeck::perms` - access policy and the cipher engine
//! - `opsdeck::store` - storage abstraction and SQLite
//! - `opsdeck::exec` - script registry and executor

pub mod audit;
pub mod config;
pub mod console;
pub mod credentials;
pub mod error;
pub mod servers;

pub use audit::AuditRecorder;
pub use config::{ConfigError, ConsoleConfig};
pub use console::{Console, ConsoleBuilder};
pub use credentials::CredentialService;
pub use error::{ConsoleError, Result};
pub use servers::{ProbeResult, Prober, ServerService, TcpProber};

pub use opsdeck_core as core;
pub use opsdeck_exec as exec;
pub use opsdeck_perms as perms;
pub use opsdeck_store as store;

pub use opsdeck_core::{
    Actor, ActorId, AuditAction, AuditLogEntry, AuditOutcome, AuditQuery, ChainReport,
    CredentialFull, CredentialId, CredentialSummary, NewCredential, RequestContext, ResourceType,
    Role, Server, ServerId, ServerStatus,
};
pub use opsdeck_exec::{ScriptOutput, ScriptSpec};
