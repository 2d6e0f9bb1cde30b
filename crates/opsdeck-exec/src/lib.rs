//! # opsdeck Exec
//!
//! Bounded executor for privileged maintenance scripts.
//!
//! ## Overview
//!
//! Operators never send commands. They name a script by key, and the
//! executor looks the key up in a [`ScriptRegistry`] fixed at startup. The
//! registered program is started directly (no shell) with stdin closed;
//! stdout and stderr are captured together, up to a byte cap, and the run is
//! killed if it exceeds its timeout.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use opsdeck_exec::{ExecLimits, ScriptExecutor, ScriptRegistry, ScriptSpec};
//!
//! async fn example() {
//!     let registry = ScriptRegistry::builder()
//!         .register(
//!             "restartApp",
//!             ScriptSpec::new("/usr/bin/systemctl").args(["restart", "app"]),
//!         )
//!         .unwrap()
//!         .build();
//!
//!     let executor = ScriptExecutor::new(registry, ExecLimits::default());
//!     let output = executor.run("restartApp").await.unwrap();
//!     println!("{}", output.output);
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **No injection**: the key only selects a registry entry; unknown keys
//!   fail before anything is spawned
//! - **Bounded**: time, captured bytes and post-exit pipe draining are all
//!   capped
//! - **No retries**: one call, at most one child

pub mod error;
pub mod executor;
pub mod registry;
pub mod sink;
pub mod spawner;

pub use error::{ExecError, Result};
pub use executor::{ExecLimits, ScriptExecutor, ScriptOutput};
pub use registry::{ScriptRegistry, ScriptRegistryBuilder, ScriptSpec};
pub use sink::OutputSink;
pub use spawner::{Spawner, TokioSpawner};
