//! The Console: unified API over credentials, servers and the audit trail.
//!
//! Every call takes a [`RequestContext`] naming the authenticated actor.
//! The access guard runs first; nothing is looked up, changed or audited
//! for a denied call.

use std::sync::Arc;

use opsdeck_core::{
    AuditLogEntry, AuditQuery, ChainReport, CredentialFull, CredentialId, CredentialSummary,
    NewCredential, RequestContext, Server, ServerId,
};
use opsdeck_exec::{ScriptExecutor, ScriptOutput, Spawner};
use opsdeck_perms::{CipherEngine, CipherKey};
use opsdeck_store::Store;
use zeroize::Zeroize;

use crate::audit::AuditRecorder;
use crate::config::ConsoleConfig;
use crate::credentials::CredentialService;
use crate::error::Result;
use crate::servers::{Prober, ServerService, TcpProber};

/// The operations console.
pub struct Console<S: Store> {
    store: Arc<S>,
    config: ConsoleConfig,
    audit: AuditRecorder<S>,
    credentials: CredentialService<S>,
    servers: ServerService<S>,
}

impl<S: Store> Console<S> {
    /// Build a console from configuration, with the real spawner and prober.
    pub fn new(store: S, config: ConsoleConfig) -> Result<Self> {
        Self::builder(store).config(config).build()
    }

    pub fn builder(store: S) -> ConsoleBuilder<S> {
        ConsoleBuilder {
            store,
            config: ConsoleConfig::default(),
            cipher_key: None,
            spawner: None,
            prober: None,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration in effect, with the key text cleared.
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_credential(
        &self,
        ctx: &RequestContext,
        input: NewCredential,
    ) -> Result<CredentialSummary> {
        self.credentials.create(ctx, input).await
    }

    pub async fn list_credentials(&self, ctx: &RequestContext) -> Result<Vec<CredentialSummary>> {
        self.credentials.list(ctx).await
    }

    pub async fn read_credential_secret(
        &self,
        ctx: &RequestContext,
        id: &CredentialId,
    ) -> Result<CredentialFull> {
        self.credentials.read_secret(ctx, id).await
    }

    pub async fn delete_credential(&self, ctx: &RequestContext, id: &CredentialId) -> Result<()> {
        self.credentials.delete(ctx, id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Servers
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_server(
        &self,
        ctx: &RequestContext,
        name: &str,
        address: &str,
    ) -> Result<Server> {
        self.servers.create(ctx, name, address).await
    }

    pub async fn list_servers(&self, ctx: &RequestContext) -> Result<Vec<Server>> {
        self.servers.list(ctx).await
    }

    pub async fn ping_server(&self, ctx: &RequestContext, id: &ServerId) -> Result<Server> {
        self.servers.ping(ctx, id).await
    }

    pub async fn run_script(
        &self,
        ctx: &RequestContext,
        server_id: &ServerId,
        key: &str,
    ) -> Result<ScriptOutput> {
        self.servers.run_script(ctx, server_id, key).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn query_audit(
        &self,
        ctx: &RequestContext,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLogEntry>> {
        self.audit.query(ctx, query).await
    }

    pub async fn verify_audit_chain(&self, ctx: &RequestContext) -> Result<ChainReport> {
        self.audit.verify(ctx).await
    }
}

/// Assembles a [`Console`], allowing test seams to be swapped in.
pub struct ConsoleBuilder<S> {
    store: S,
    config: ConsoleConfig,
    cipher_key: Option<CipherKey>,
    spawner: Option<Arc<dyn Spawner>>,
    prober: Option<Arc<dyn Prober>>,
}

impl<S: Store> ConsoleBuilder<S> {
    pub fn config(mut self, config: ConsoleConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this key instead of the one in the configuration.
    pub fn cipher_key(mut self, key: CipherKey) -> Self {
        self.cipher_key = Some(key);
        self
    }

    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn build(self) -> Result<Console<S>> {
        let mut config = self.config;
        config.validate()?;

        let key = match self.cipher_key {
            Some(key) => {
                config.cipher_key.zeroize();
                key
            }
            None => config.take_cipher_key()?,
        };
        let cipher = Arc::new(CipherEngine::new(key));

        let mut executor = ScriptExecutor::new(config.script_registry()?, config.exec_limits());
        if let Some(spawner) = self.spawner {
            executor = executor.with_spawner(spawner);
        }
        let prober: Arc<dyn Prober> = match self.prober {
            Some(prober) => prober,
            None => Arc::new(TcpProber::new(config.probe_port, config.probe_timeout())),
        };

        let store = Arc::new(self.store);
        let audit = AuditRecorder::new(store.clone());
        let credentials = CredentialService::new(store.clone(), cipher, audit.clone());
        let servers = ServerService::new(
            store.clone(),
            Arc::new(executor),
            prober,
            audit.clone(),
            config.audit_output_limit,
        );

        tracing::info!(
            scripts = config.scripts.len(),
            script_timeout_secs = config.script_timeout_secs,
            "console ready"
        );

        Ok(Console {
            store,
            config,
            audit,
            credentials,
            servers,
        })
    }
}
