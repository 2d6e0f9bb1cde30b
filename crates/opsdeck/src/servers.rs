//! Managed servers: registration, reachability probes and scripts.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpStream;

use opsdeck_core::{
    now_millis, AuditAction, AuditDraft, AuditOutcome, RequestContext, ResourceType, Server,
    ServerId, ServerStatus,
};
use opsdeck_exec::{ExecError, ScriptExecutor, ScriptOutput};
use opsdeck_perms::{AccessGuard, Operation};
use opsdeck_store::{InsertResult, Store};

use crate::audit::{bounded_text, AuditRecorder};
use crate::error::{ConsoleError, Result};

/// Outcome of one reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency: Duration,
}

/// Reachability check seam.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str) -> ProbeResult;
}

/// Probes by opening a TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    default_port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(default_port: u16, timeout: Duration) -> Self {
        Self {
            default_port,
            timeout,
        }
    }

    /// `host:port` as given, or the host on the default port.
    fn target(&self, address: &str) -> String {
        if address.parse::<SocketAddr>().is_ok() {
            return address.to_string();
        }
        if let Ok(ip) = address.parse::<IpAddr>() {
            return SocketAddr::new(ip, self.default_port).to_string();
        }
        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => {
                address.to_string()
            }
            _ => format!("{}:{}", address, self.default_port),
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: &str) -> ProbeResult {
        let target = self.target(address);
        let started = Instant::now();
        let connected = tokio::time::timeout(self.timeout, TcpStream::connect(&target)).await;
        let reachable = matches!(connected, Ok(Ok(_)));
        if !reachable {
            tracing::debug!(%target, "probe failed");
        }
        ProbeResult {
            reachable,
            latency: started.elapsed(),
        }
    }
}

/// Server create/list/ping/script.
pub struct ServerService<S> {
    store: Arc<S>,
    executor: Arc<ScriptExecutor>,
    prober: Arc<dyn Prober>,
    audit: AuditRecorder<S>,
    audit_output_limit: usize,
    guard: AccessGuard,
}

impl<S: Store> ServerService<S> {
    pub fn new(
        store: Arc<S>,
        executor: Arc<ScriptExecutor>,
        prober: Arc<dyn Prober>,
        audit: AuditRecorder<S>,
        audit_output_limit: usize,
    ) -> Self {
        Self {
            store,
            executor,
            prober,
            audit,
            audit_output_limit,
            guard: AccessGuard::new(),
        }
    }

    pub async fn create(&self, ctx: &RequestContext, name: &str, address: &str) -> Result<Server> {
        self.guard.authorize(ctx.actor(), Operation::ServerCreate)?;

        let (name, address) = (name.trim(), address.trim());
        if name.is_empty() {
            return Err(ConsoleError::Validation("server name must not be empty".into()));
        }
        if address.is_empty() || address.chars().any(char::is_whitespace) {
            return Err(ConsoleError::Validation(format!(
                "invalid server address {:?}",
                address
            )));
        }

        let server = Server::new(name, address, now_millis());
        if self.store.insert_server(&server).await? == InsertResult::AlreadyExists {
            return Err(ConsoleError::Conflict(format!(
                "server {} already exists",
                server.id
            )));
        }

        let draft = AuditDraft::new(
            ctx.actor(),
            AuditAction::Create,
            ResourceType::Server,
            server.id.to_string(),
        )
        .origin(ctx.origin())
        .detail(json!({ "name": server.name, "address": server.address }));

        if let Err(source) = self.audit.record(draft).await {
            let rolled_back = matches!(self.store.delete_server(&server.id).await, Ok(true));
            return Err(ConsoleError::AuditWrite {
                source,
                rolled_back,
            });
        }

        tracing::info!(server = %server.id, name = %server.name, "server registered");
        Ok(server)
    }

    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<Server>> {
        self.guard.authorize(ctx.actor(), Operation::ServerList)?;
        Ok(self.store.list_servers().await?)
    }

    /// Probe a server and record the observed status.
    pub async fn ping(&self, ctx: &RequestContext, id: &ServerId) -> Result<Server> {
        self.guard.authorize(ctx.actor(), Operation::ServerPing)?;

        let previous = self
            .store
            .get_server(id)
            .await?
            .ok_or_else(|| ConsoleError::not_found(ResourceType::Server, id))?;

        let probe = self.prober.probe(&previous.address).await;
        let status = if probe.reachable {
            ServerStatus::Up
        } else {
            ServerStatus::Down
        };
        let probed_at = now_millis();

        if !self
            .store
            .update_server_status(id, status, Some(probed_at))
            .await?
        {
            return Err(ConsoleError::not_found(ResourceType::Server, id));
        }

        let latency_ms = probe.latency.as_millis() as u64;
        let draft = AuditDraft::new(
            ctx.actor(),
            AuditAction::Ping,
            ResourceType::Server,
            id.to_string(),
        )
        .origin(ctx.origin())
        .detail(json!({ "status": status, "latency_ms": latency_ms }));

        if let Err(source) = self.audit.record(draft).await {
            let rolled_back = matches!(
                self.store
                    .update_server_status(id, previous.status, previous.last_probe_at)
                    .await,
                Ok(true)
            );
            return Err(ConsoleError::AuditWrite {
                source,
                rolled_back,
            });
        }

        tracing::info!(server = %id, %status, latency_ms, "server probed");
        Ok(Server {
            status,
            last_probe_at: Some(probed_at),
            ..previous
        })
    }

    /// Run a registered maintenance script for a server.
    ///
    /// The run is audited whatever its outcome, except when the key is not
    /// registered: then nothing is spawned and nothing is recorded.
    pub async fn run_script(
        &self,
        ctx: &RequestContext,
        server_id: &ServerId,
        key: &str,
    ) -> Result<ScriptOutput> {
        self.guard.authorize(ctx.actor(), Operation::ServerScript)?;

        let server = self
            .store
            .get_server(server_id)
            .await?
            .ok_or_else(|| ConsoleError::not_found(ResourceType::Server, server_id))?;

        if !self.executor.registry().contains(key) {
            return Err(ConsoleError::UnknownScript(key.to_string()));
        }

        tracing::info!(server = %server.id, script = key, actor = %ctx.actor().id, "running script");
        let result = self.executor.run(key).await;

        let Some((outcome, detail)) = script_audit_detail(key, &result, self.audit_output_limit)
        else {
            return result.map_err(ConsoleError::from);
        };

        let draft = AuditDraft::new(
            ctx.actor(),
            AuditAction::Script,
            ResourceType::Server,
            server.id.to_string(),
        )
        .origin(ctx.origin())
        .outcome(outcome)
        .detail(detail);

        let result = result.map_err(ConsoleError::from);
        if let Err(source) = self.audit.record(draft).await {
            return Err(ConsoleError::ScriptAuditWrite {
                key: key.to_string(),
                source,
                run: Box::new(result),
            });
        }

        result
    }
}

/// Outcome and bounded detail for a finished run. `None` when nothing ran.
fn script_audit_detail(
    key: &str,
    result: &std::result::Result<ScriptOutput, ExecError>,
    limit: usize,
) -> Option<(AuditOutcome, serde_json::Value)> {
    let entry = match result {
        Ok(out) => {
            let (output, cut) = bounded_text(&out.output, limit);
            (
                AuditOutcome::Success,
                json!({
                    "script": key,
                    "exit_code": out.exit_code,
                    "output": output,
                    "truncated": out.truncated || cut,
                }),
            )
        }
        Err(ExecError::ScriptFailed {
            exit_code, output, ..
        }) => {
            let (output, cut) = bounded_text(output, limit);
            (
                AuditOutcome::Failure,
                json!({
                    "script": key,
                    "exit_code": exit_code,
                    "output": output,
                    "truncated": cut,
                }),
            )
        }
        Err(ExecError::ScriptTimedOut {
            timeout, output, ..
        }) => {
            let (output, cut) = bounded_text(output, limit);
            (
                AuditOutcome::Failure,
                json!({
                    "script": key,
                    "exit_code": null,
                    "timed_out": true,
                    "timeout_ms": timeout.as_millis() as u64,
                    "output": output,
                    "truncated": cut,
                }),
            )
        }
        Err(ExecError::Spawn(e)) | Err(ExecError::Io(e)) => (
            AuditOutcome::Failure,
            json!({ "script": key, "error": e.to_string() }),
        ),
        Err(ExecError::UnknownScript(_)) | Err(ExecError::InvalidRegistration(_)) => return None,
    };
    Some(entry)
}
