//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use opsdeck_core::{
    now_millis, AuditDraft, AuditLogEntry, AuditQuery, ChainHash, Credential, CredentialId,
    CredentialSummary, Server, ServerId, ServerStatus,
};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Credentials indexed by ID.
    credentials: HashMap<CredentialId, Credential>,

    /// Audit trail, index = seq - 1.
    audit: Vec<AuditLogEntry>,

    /// Servers indexed by ID.
    servers: HashMap<ServerId, Server>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.credentials.contains_key(&credential.id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.credentials.insert(credential.id, credential.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        Ok(self.read()?.credentials.get(id).cloned())
    }

    async fn list_credential_summaries(&self) -> Result<Vec<CredentialSummary>> {
        let inner = self.read()?;
        let mut summaries: Vec<CredentialSummary> =
            inner.credentials.values().map(Credential::summary).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn delete_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        Ok(self.write()?.credentials.remove(id))
    }

    async fn append_audit(&self, draft: AuditDraft) -> Result<AuditLogEntry> {
        let mut inner = self.write()?;

        let prev_hash = inner
            .audit
            .last()
            .map(|e| e.entry_hash)
            .unwrap_or(ChainHash::GENESIS);
        let seq = inner.audit.len() as u64 + 1;

        let entry = draft.seal(seq, now_millis(), prev_hash)?;
        inner.audit.push(entry.clone());
        Ok(entry)
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>> {
        let inner = self.read()?;
        let matching = inner.audit.iter().filter(|e| query.matches(e)).cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn audit_trail(&self) -> Result<Vec<AuditLogEntry>> {
        Ok(self.read()?.audit.clone())
    }

    async fn insert_server(&self, server: &Server) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.servers.contains_key(&server.id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.servers.insert(server.id, server.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_server(&self, id: &ServerId) -> Result<Option<Server>> {
        Ok(self.read()?.servers.get(id).cloned())
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        let inner = self.read()?;
        let mut servers: Vec<Server> = inner.servers.values().cloned().collect();
        servers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(servers)
    }

    async fn update_server_status(
        &self,
        id: &ServerId,
        status: ServerStatus,
        probed_at: Option<i64>,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.servers.get_mut(id) {
            Some(server) => {
                server.status = status;
                server.last_probe_at = probed_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_server(&self, id: &ServerId) -> Result<bool> {
        Ok(self.write()?.servers.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdeck_core::{
        verify_chain, Actor, ActorId, AuditAction, CreatorRef, ResourceType, Role, SealedSecret,
    };
    use std::sync::Arc;

    fn make_credential(title: &str, created_at: i64) -> Credential {
        Credential {
            id: CredentialId::generate(),
            title: title.into(),
            username: None,
            secret: SealedSecret::from_bytes(vec![1; 48]),
            url: None,
            notes: None,
            creator: CreatorRef {
                id: ActorId::from_bytes([3; 16]),
                name: "alice".into(),
            },
            created_at,
        }
    }

    fn draft(n: usize) -> AuditDraft {
        let actor = Actor::new(ActorId::from_bytes([3; 16]), "alice", Role::Admin);
        AuditDraft::new(&actor, AuditAction::Read, ResourceType::Credential, format!("c{}", n))
    }

    #[tokio::test]
    async fn test_memory_store_credentials() {
        let store = MemoryStore::new();
        let older = make_credential("older", 1);
        let newer = make_credential("newer", 2);

        assert_eq!(
            store.insert_credential(&newer).await.unwrap(),
            InsertResult::Inserted
        );
        store.insert_credential(&older).await.unwrap();
        assert_eq!(
            store.insert_credential(&older).await.unwrap(),
            InsertResult::AlreadyExists
        );

        let titles: Vec<_> = store
            .list_credential_summaries()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["older", "newer"]);

        let removed = store.delete_credential(&older.id).await.unwrap().unwrap();
        assert_eq!(removed.title, "older");
        assert!(store.get_credential(&older.id).await.unwrap().is_none());
        assert!(store.delete_credential(&older.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_audit_chain() {
        let store = MemoryStore::new();
        for n in 0..4 {
            store.append_audit(draft(n)).await.unwrap();
        }

        let trail = store.audit_trail().await.unwrap();
        assert_eq!(trail.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(verify_chain(&trail).unwrap().is_intact());

        let limited = store
            .query_audit(&AuditQuery::all().limit(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);

        let one = store
            .query_audit(&AuditQuery::all().resource(ResourceType::Credential, "c2"))
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].seq, 3);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_chain_linear() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for n in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_audit(draft(n)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let trail = store.audit_trail().await.unwrap();
        assert_eq!(trail.len(), 16);
        assert!(verify_chain(&trail).unwrap().is_intact());
    }

    #[tokio::test]
    async fn test_server_status_update() {
        let store = MemoryStore::new();
        let server = Server::new("db-1", "10.0.0.9", 5);
        store.insert_server(&server).await.unwrap();

        assert!(store
            .update_server_status(&server.id, ServerStatus::Up, Some(10))
            .await
            .unwrap());
        let stored = store.get_server(&server.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ServerStatus::Up);
        assert_eq!(stored.last_probe_at, Some(10));

        assert!(!store
            .update_server_status(&ServerId::generate(), ServerStatus::Down, Some(11))
            .await
            .unwrap());

        assert!(store.delete_server(&server.id).await.unwrap());
        assert!(!store.delete_server(&server.id).await.unwrap());
        assert!(store.list_servers().await.unwrap().is_empty());
    }
}
