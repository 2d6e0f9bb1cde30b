//! Audit trail recorder.
//!
//! Every sensitive action that completes is written here. Sequencing and
//! chain hashing happen inside the store's append, so this layer only
//! builds drafts, bounds their detail and exposes the read side.

use std::sync::Arc;

use opsdeck_core::{verify_chain, AuditDraft, AuditLogEntry, AuditQuery, ChainReport, RequestContext};
use opsdeck_perms::{AccessGuard, Operation};
use opsdeck_store::{Store, StoreError};

use crate::error::Result;

/// Appends to and reads from the audit trail.
pub struct AuditRecorder<S> {
    store: Arc<S>,
    guard: AccessGuard,
}

impl<S> Clone for AuditRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            guard: self.guard,
        }
    }
}

impl<S: Store> AuditRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            guard: AccessGuard::new(),
        }
    }

    /// Append one entry. Errors are returned untouched for the caller to
    /// turn into an audit-write failure.
    pub async fn record(&self, draft: AuditDraft) -> std::result::Result<AuditLogEntry, StoreError> {
        let action = draft.action;
        let resource_id = draft.resource_id.clone();
        match self.store.append_audit(draft).await {
            Ok(entry) => {
                tracing::debug!(
                    seq = entry.seq,
                    action = %entry.action,
                    resource = %entry.resource_type,
                    resource_id = %entry.resource_id,
                    outcome = %entry.outcome,
                    "audit entry recorded"
                );
                Ok(entry)
            }
            Err(e) => {
                tracing::error!(%action, %resource_id, error = %e, "audit write failed");
                Err(e)
            }
        }
    }

    /// Read entries matching `query`, in sequence order.
    pub async fn query(
        &self,
        ctx: &RequestContext,
        query: &AuditQuery,
    ) -> Result<Vec<AuditLogEntry>> {
        self.guard.authorize(ctx.actor(), Operation::AuditQuery)?;
        Ok(self.store.query_audit(query).await?)
    }

    /// Recompute every hash in the trail.
    pub async fn verify(&self, ctx: &RequestContext) -> Result<ChainReport> {
        self.guard.authorize(ctx.actor(), Operation::AuditVerify)?;
        let trail = self.store.audit_trail().await?;
        let report = verify_chain(&trail).map_err(StoreError::from)?;
        match report.first_broken {
            Some(seq) => tracing::warn!(
                entries = report.entries,
                first_broken = seq,
                "audit chain verification failed"
            ),
            None => tracing::info!(entries = report.entries, "audit chain intact"),
        }
        Ok(report)
    }
}

/// Cut `text` to at most `limit` bytes on a char boundary.
///
/// Returns the kept prefix and whether anything was cut.
pub fn bounded_text(text: &str, limit: usize) -> (&str, bool) {
    if text.len() <= limit {
        return (text, false);
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdeck_core::{Actor, ActorId, AuditAction, ResourceType, Role};
    use opsdeck_store::MemoryStore;

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new(Actor::new(ActorId::generate(), "op", role), None)
    }

    #[test]
    fn test_bounded_text() {
        assert_eq!(bounded_text("hello", 10), ("hello", false));
        assert_eq!(bounded_text("hello", 5), ("hello", false));
        assert_eq!(bounded_text("hello", 3), ("hel", true));
        // 'é' is two bytes; never split it.
        assert_eq!(bounded_text("héllo", 2), ("h", true));
        assert_eq!(bounded_text("héllo", 0), ("", true));
    }

    #[tokio::test]
    async fn test_query_and_verify_are_admin_only() {
        let recorder = AuditRecorder::new(Arc::new(MemoryStore::new()));
        let admin = ctx(Role::Admin);
        recorder
            .record(AuditDraft::new(
                admin.actor(),
                AuditAction::Read,
                ResourceType::Credential,
                "c1",
            ))
            .await
            .unwrap();

        for role in [Role::SystemManager, Role::TechnicalSupport, Role::Staff] {
            assert!(recorder.query(&ctx(role), &AuditQuery::all()).await.is_err());
            assert!(recorder.verify(&ctx(role)).await.is_err());
        }

        assert_eq!(recorder.query(&admin, &AuditQuery::all()).await.unwrap().len(), 1);
        let report = recorder.verify(&admin).await.unwrap();
        assert_eq!(report.entries, 1);
        assert!(report.is_intact());
    }
}
