//! Observable stand-ins for the store, spawner and prober.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use opsdeck::{ProbeResult, Prober};
use opsdeck_core::{
    AuditDraft, AuditLogEntry, AuditQuery, Credential, CredentialId, CredentialSummary, Server,
    ServerId, ServerStatus,
};
use opsdeck_exec::Spawner;
use opsdeck_store::{InsertResult, Result, Store, StoreError};

/// Wraps a store, counting calls and optionally failing audit appends.
#[derive(Default)]
pub struct SpyStore<S> {
    inner: S,
    credential_gets: AtomicUsize,
    credential_lists: AtomicUsize,
    credential_writes: AtomicUsize,
    audit_appends: AtomicUsize,
    server_gets: AtomicUsize,
    server_writes: AtomicUsize,
    fail_audit_writes: AtomicBool,
}

impl<S: Store> SpyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            credential_gets: AtomicUsize::new(0),
            credential_lists: AtomicUsize::new(0),
            credential_writes: AtomicUsize::new(0),
            audit_appends: AtomicUsize::new(0),
            server_gets: AtomicUsize::new(0),
            server_writes: AtomicUsize::new(0),
            fail_audit_writes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Make every following audit append fail (or succeed again).
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    pub fn credential_gets(&self) -> usize {
        self.credential_gets.load(Ordering::SeqCst)
    }

    pub fn credential_lists(&self) -> usize {
        self.credential_lists.load(Ordering::SeqCst)
    }

    /// Inserts and deletes.
    pub fn credential_writes(&self) -> usize {
        self.credential_writes.load(Ordering::SeqCst)
    }

    /// Successful appends only.
    pub fn audit_appends(&self) -> usize {
        self.audit_appends.load(Ordering::SeqCst)
    }

    pub fn server_gets(&self) -> usize {
        self.server_gets.load(Ordering::SeqCst)
    }

    /// Inserts, status updates and deletes.
    pub fn server_writes(&self) -> usize {
        self.server_writes.load(Ordering::SeqCst)
    }

    /// Total calls that touched storage in any way.
    pub fn total_calls(&self) -> usize {
        self.credential_gets()
            + self.credential_lists()
            + self.credential_writes()
            + self.audit_appends()
            + self.server_gets()
            + self.server_writes()
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

#[async_trait]
impl<S: Store> Store for SpyStore<S> {
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult> {
        bump(&self.credential_writes);
        self.inner.insert_credential(credential).await
    }

    async fn get_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        bump(&self.credential_gets);
        self.inner.get_credential(id).await
    }

    async fn list_credential_summaries(&self) -> Result<Vec<CredentialSummary>> {
        bump(&self.credential_lists);
        self.inner.list_credential_summaries().await
    }

    async fn delete_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        bump(&self.credential_writes);
        self.inner.delete_credential(id).await
    }

    async fn append_audit(&self, draft: AuditDraft) -> Result<AuditLogEntry> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidData("injected audit write failure".into()));
        }
        let entry = self.inner.append_audit(draft).await?;
        bump(&self.audit_appends);
        Ok(entry)
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>> {
        self.inner.query_audit(query).await
    }

    async fn audit_trail(&self) -> Result<Vec<AuditLogEntry>> {
        self.inner.audit_trail().await
    }

    async fn insert_server(&self, server: &Server) -> Result<InsertResult> {
        bump(&self.server_writes);
        self.inner.insert_server(server).await
    }

    async fn get_server(&self, id: &ServerId) -> Result<Option<Server>> {
        bump(&self.server_gets);
        self.inner.get_server(id).await
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        self.inner.list_servers().await
    }

    async fn update_server_status(
        &self,
        id: &ServerId,
        status: ServerStatus,
        probed_at: Option<i64>,
    ) -> Result<bool> {
        bump(&self.server_writes);
        self.inner.update_server_status(id, status, probed_at).await
    }

    async fn delete_server(&self, id: &ServerId) -> Result<bool> {
        bump(&self.server_writes);
        self.inner.delete_server(id).await
    }
}

/// Spawns real processes and counts them.
#[derive(Debug, Default)]
pub struct SpySpawner {
    spawned: AtomicUsize,
}

impl SpySpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl Spawner for SpySpawner {
    fn spawn(&self, command: &mut Command) -> io::Result<Child> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        command.spawn()
    }
}

/// Answers every probe with a fixed reachability.
#[derive(Debug)]
pub struct StaticProber {
    reachable: AtomicBool,
    probes: AtomicUsize,
}

impl StaticProber {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for StaticProber {
    async fn probe(&self, _address: &str) -> ProbeResult {
        self.probes.fetch_add(1, Ordering::SeqCst);
        ProbeResult {
            reachable: self.reachable.load(Ordering::SeqCst),
            latency: Duration::from_millis(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdeck_core::{Actor, ActorId, AuditAction, ResourceType, Role};
    use opsdeck_store::MemoryStore;

    #[tokio::test]
    async fn test_spy_store_counts_and_fails_on_demand() {
        let spy = SpyStore::new(MemoryStore::new());
        let actor = Actor::new(ActorId::generate(), "a", Role::Admin);
        let draft = || AuditDraft::new(&actor, AuditAction::Read, ResourceType::Credential, "c");

        spy.append_audit(draft()).await.unwrap();
        spy.fail_audit_writes(true);
        assert!(spy.append_audit(draft()).await.is_err());
        spy.fail_audit_writes(false);
        spy.append_audit(draft()).await.unwrap();

        assert_eq!(spy.audit_appends(), 2);
        assert_eq!(spy.inner().audit_trail().await.unwrap().len(), 2);
        spy.list_credential_summaries().await.unwrap();
        assert_eq!(spy.credential_lists(), 1);
    }
}
