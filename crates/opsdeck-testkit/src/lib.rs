//! # opsdeck Testkit
//!
//! Testing utilities for opsdeck.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: actors per role, request contexts and a ready console
//!   over an in-memory store
//! - **Spies**: a store wrapper that counts calls and can fail audit
//!   writes, a counting spawner and a scripted prober
//! - **Generators**: proptest strategies for roles, operations and
//!   credential input
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use opsdeck_testkit::fixtures::{ctx, sh_script, TestConsole};
//! use opsdeck::core::{NewCredential, Role};
//!
//! async fn example() {
//!     let t = TestConsole::with_scripts([("restartApp", sh_script("echo restarting"))]);
//!     let admin = ctx(Role::Admin);
//!     let summary = t
//!         .console
//!         .create_credential(&admin, NewCredential::new("db", "pw"))
//!         .await
//!         .unwrap();
//!     assert_eq!(t.store.audit_appends(), 1);
//!     # let _ = summary;
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod spy;

pub use fixtures::{actor, ctx, sh_script, TestConsole, TEST_KEY_HEX};
pub use spy::{SpySpawner, SpyStore, StaticProber};
