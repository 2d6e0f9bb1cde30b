//! Store trait: the abstract interface for opsdeck persistence.
//!
//! This trait keeps the core storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use opsdeck_core::{
    AuditDraft, AuditLogEntry, AuditQuery, Credential, CredentialId, CredentialSummary, Server,
    ServerId, ServerStatus,
};

use crate::error::Result;

/// Result of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with the same id already exists; nothing was written.
    AlreadyExists,
}

/// The Store trait: async interface for opsdeck persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **No secret on list**: `list_credential_summaries` is a projection;
///   implementations must not load the sealed secret to build it.
/// - **Audit append is atomic**: `append_audit` reads the chain head,
///   assigns `seq`/timestamp/`prev_hash` and writes the sealed entry as one
///   step, so concurrent appends never fork the chain.
/// - **No audit mutation**: there is deliberately no update or delete for
///   audit entries.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Credential Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a credential record (secret already sealed).
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult>;

    /// Get a credential including its sealed secret.
    async fn get_credential(&self, id: &CredentialId) -> Result<Option<Credential>>;

    /// List every credential without its secret, oldest first.
    async fn list_credential_summaries(&self) -> Result<Vec<CredentialSummary>>;

    /// Permanently remove a credential, returning what was removed.
    async fn delete_credential(&self, id: &CredentialId) -> Result<Option<Credential>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a new entry at the head of the chain.
    async fn append_audit(&self, draft: AuditDraft) -> Result<AuditLogEntry>;

    /// Entries matching `query`, in sequence order.
    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>>;

    /// The whole trail in sequence order (for chain verification).
    async fn audit_trail(&self) -> Result<Vec<AuditLogEntry>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Server Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a server record.
    async fn insert_server(&self, server: &Server) -> Result<InsertResult>;

    /// Get a server by id.
    async fn get_server(&self, id: &ServerId) -> Result<Option<Server>>;

    /// List all servers, oldest first.
    async fn list_servers(&self) -> Result<Vec<Server>>;

    /// Record the result of a probe. Returns false if the server is gone.
    async fn update_server_status(
        &self,
        id: &ServerId,
        status: ServerStatus,
        probed_at: Option<i64>,
    ) -> Result<bool>;

    /// Remove a server. Returns false if it did not exist.
    async fn delete_server(&self, id: &ServerId) -> Result<bool>;
}

/// Lets callers keep a handle on a store they have handed to the console.
#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn insert_credential(&self, credential: &Credential) -> Result<InsertResult> {
        (**self).insert_credential(credential).await
    }

    async fn get_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        (**self).get_credential(id).await
    }

    async fn list_credential_summaries(&self) -> Result<Vec<CredentialSummary>> {
        (**self).list_credential_summaries().await
    }

    async fn delete_credential(&self, id: &CredentialId) -> Result<Option<Credential>> {
        (**self).delete_credential(id).await
    }

    async fn append_audit(&self, draft: AuditDraft) -> Result<AuditLogEntry> {
        (**self).append_audit(draft).await
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>> {
        (**self).query_audit(query).await
    }

    async fn audit_trail(&self) -> Result<Vec<AuditLogEntry>> {
        (**self).audit_trail().await
    }

    async fn insert_server(&self, server: &Server) -> Result<InsertResult> {
        (**self).insert_server(server).await
    }

    async fn get_server(&self, id: &ServerId) -> Result<Option<Server>> {
        (**self).get_server(id).await
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        (**self).list_servers().await
    }

    async fn update_server_status(
        &self,
        id: &ServerId,
        status: ServerStatus,
        probed_at: Option<i64>,
    ) -> Result<bool> {
        (**self).update_server_status(id, status, probed_at).await
    }

    async fn delete_server(&self, id: &ServerId) -> Result<bool> {
        (**self).delete_server(id).await
    }
}
