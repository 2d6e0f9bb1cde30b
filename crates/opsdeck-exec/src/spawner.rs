//! Process creation seam.
//!
//! The executor never calls `Command::spawn` directly so tests can observe
//! or refuse spawns.

use std::io;

use tokio::process::{Child, Command};

/// Starts a fully configured command.
pub trait Spawner: Send + Sync {
    fn spawn(&self, command: &mut Command) -> io::Result<Child>;
}

/// Spawns real processes through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, command: &mut Command) -> io::Result<Child> {
        command.spawn()
    }
}
