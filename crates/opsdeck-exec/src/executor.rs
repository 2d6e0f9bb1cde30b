//! Runs registered scripts under a time budget.
//!
//! One call spawns at most one child. Its stdout and stderr are drained
//! concurrently into a single [`OutputSink`], the whole run is bounded by
//! `ExecLimits::timeout`, and a child that overruns is killed and reaped.
//! Nothing is retried and nothing is audited here; the caller does that.
//!
//! Only the direct child is killed on timeout. Processes it started in the
//! background survive it; the run still returns on time because pipes left
//! open by them are abandoned rather than awaited. Registered scripts that
//! fork long-lived work must clean up after themselves.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::{ExecError, Result};
use crate::registry::ScriptRegistry;
use crate::sink::OutputSink;
use crate::spawner::{Spawner, TokioSpawner};

const CHUNK: usize = 4096;

/// Bounds applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    /// Wall-clock budget for the whole run, output drain included. On
    /// expiry the direct child is killed, not its descendants.
    pub timeout: Duration,
    /// How long to keep reading pipes after the child has exited.
    pub drain_grace: Duration,
    /// Cap on captured output (stdout and stderr combined).
    pub max_output_bytes: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            drain_grace: Duration::from_millis(250),
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Result of a script that exited with status 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub key: String,
    pub output: String,
    pub exit_code: i32,
    /// Output exceeded `max_output_bytes` and was cut.
    pub truncated: bool,
    pub elapsed: Duration,
}

/// Executes scripts from a fixed registry.
pub struct ScriptExecutor {
    registry: ScriptRegistry,
    limits: ExecLimits,
    spawner: Arc<dyn Spawner>,
}

impl ScriptExecutor {
    pub fn new(registry: ScriptRegistry, limits: ExecLimits) -> Self {
        Self {
            registry,
            limits,
            spawner: Arc::new(TokioSpawner),
        }
    }

    /// Replace the process spawner.
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn limits(&self) -> ExecLimits {
        self.limits
    }

    /// Run the script registered under `key`.
    pub async fn run(&self, key: &str) -> Result<ScriptOutput> {
        let spec = self
            .registry
            .get(key)
            .ok_or_else(|| ExecError::UnknownScript(key.to_string()))?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = self.spawner.spawn(&mut command).map_err(ExecError::Spawn)?;
        tracing::info!(script = key, pid = child.id(), "script started");

        let mut pipes = Pipes::new(child.stdout.take(), child.stderr.take());
        let mut sink = OutputSink::new(self.limits.max_output_bytes);

        let waited = tokio::time::timeout(
            self.limits.timeout,
            supervise(&mut child, &mut pipes, &mut sink, self.limits.drain_grace),
        )
        .await;

        let status = match waited {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(
                    script = key,
                    timeout_ms = self.limits.timeout.as_millis() as u64,
                    "script timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    tracing::error!(script = key, error = %e, "failed to kill timed out script");
                }
                return Err(ExecError::ScriptTimedOut {
                    key: key.to_string(),
                    timeout: self.limits.timeout,
                    output: sink.into_string(),
                });
            }
        };

        let elapsed = started.elapsed();
        let truncated = sink.truncated();
        let output = sink.into_string();

        match status.code() {
            Some(0) => {
                tracing::info!(
                    script = key,
                    elapsed_ms = elapsed.as_millis() as u64,
                    truncated,
                    "script finished"
                );
                Ok(ScriptOutput {
                    key: key.to_string(),
                    output,
                    exit_code: 0,
                    truncated,
                    elapsed,
                })
            }
            exit_code => {
                tracing::warn!(script = key, ?exit_code, "script failed");
                Err(ExecError::ScriptFailed {
                    key: key.to_string(),
                    exit_code,
                    output,
                })
            }
        }
    }
}

/// Pump both pipes until the child exits, then drain what is left for at
/// most `grace`.
async fn supervise(
    child: &mut Child,
    pipes: &mut Pipes,
    sink: &mut OutputSink,
    grace: Duration,
) -> io::Result<ExitStatus> {
    let status = loop {
        tokio::select! {
            read = pipes.pump(sink), if pipes.is_open() => read?,
            status = child.wait() => break status?,
        }
    };

    let drain = async {
        while pipes.is_open() {
            pipes.pump(sink).await?;
        }
        Ok::<(), io::Error>(())
    };
    match tokio::time::timeout(grace, drain).await {
        Ok(drained) => drained?,
        // A grandchild still holds the pipe open.
        Err(_) => tracing::debug!(grace_ms = grace.as_millis() as u64, "stopped draining output"),
    }

    Ok(status)
}

struct Pipes {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    out_buf: [u8; CHUNK],
    err_buf: [u8; CHUNK],
}

impl Pipes {
    fn new(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        Self {
            stdout,
            stderr,
            out_buf: [0; CHUNK],
            err_buf: [0; CHUNK],
        }
    }

    fn is_open(&self) -> bool {
        self.stdout.is_some() || self.stderr.is_some()
    }

    /// Move one chunk from whichever pipe is ready into `sink`.
    ///
    /// Cancel safe: a dropped call loses no bytes.
    async fn pump(&mut self, sink: &mut OutputSink) -> io::Result<()> {
        tokio::select! {
            read = read_chunk(&mut self.stdout, &mut self.out_buf) => match read? {
                0 => self.stdout = None,
                n => sink.push(&self.out_buf[..n]),
            },
            read = read_chunk(&mut self.stderr, &mut self.err_buf) => match read? {
                0 => self.stderr = None,
                n => sink.push(&self.err_buf[..n]),
            },
        }
        Ok(())
    }
}

/// Read from a pipe, or never complete if it is already closed.
async fn read_chunk<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match pipe {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}
