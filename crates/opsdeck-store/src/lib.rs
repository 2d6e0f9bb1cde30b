//! # opsdeck Store
//!
//! Storage abstraction for opsdeck. Provides a trait-based interface for
//! credential, audit and server persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The core never talks to a database directly; it goes through the
//! [`Store`] trait. The primary implementation is [`SqliteStore`], with
//! [`MemoryStore`] for tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use opsdeck_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("opsdeck.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let summaries = store.list_credential_summaries().await.unwrap();
//!     assert!(summaries.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Secret projection**: listing never reads the sealed secret column
//! - **Append-only audit**: the store assigns sequence numbers and chain
//!   hashes inside its own write lock, and SQLite triggers reject
//!   `UPDATE`/`DELETE` on the audit table
//! - **Probe-only status**: server status is written through a dedicated
//!   call used only by the probe path

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Store};
