//! Credential store operations.
//!
//! Secrets are sealed before they reach storage and opened only on the
//! single-record read path, which is always audited. The list path never
//! loads the secret column.

use std::sync::Arc;

use serde_json::json;
use zeroize::Zeroize;

use opsdeck_core::{
    now_millis, AuditAction, AuditDraft, AuditOutcome, Credential, CredentialFull, CredentialId,
    CredentialSummary, NewCredential, RequestContext, ResourceType,
};
use opsdeck_perms::{AccessGuard, CipherEngine, Operation, PermsError, MAX_SECRET_LEN};
use opsdeck_store::{InsertResult, Store};

use crate::audit::AuditRecorder;
use crate::error::{ConsoleError, Result};

const MAX_TITLE_LEN: usize = 256;

/// Credential create/list/read/delete.
pub struct CredentialService<S> {
    store: Arc<S>,
    cipher: Arc<CipherEngine>,
    audit: AuditRecorder<S>,
    guard: AccessGuard,
}

impl<S: Store> CredentialService<S> {
    pub fn new(store: Arc<S>, cipher: Arc<CipherEngine>, audit: AuditRecorder<S>) -> Self {
        Self {
            store,
            cipher,
            audit,
            guard: AccessGuard::new(),
        }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        mut input: NewCredential,
    ) -> Result<CredentialSummary> {
        self.guard.authorize(ctx.actor(), Operation::CredentialCreate)?;

        let sealed = validate(&input).and_then(|()| Ok(self.cipher.seal(input.secret.as_bytes())?));
        input.secret.zeroize();
        let sealed = sealed?;

        let credential = Credential {
            id: CredentialId::generate(),
            title: input.title.trim().to_string(),
            username: input.username,
            secret: sealed,
            url: input.url,
            notes: input.notes,
            creator: ctx.actor().into(),
            created_at: now_millis(),
        };

        if self.store.insert_credential(&credential).await? == InsertResult::AlreadyExists {
            return Err(ConsoleError::Conflict(format!(
                "credential {} already exists",
                credential.id
            )));
        }

        let draft = AuditDraft::new(
            ctx.actor(),
            AuditAction::Create,
            ResourceType::Credential,
            credential.id.to_string(),
        )
        .origin(ctx.origin())
        .detail(json!({ "title": credential.title }));

        if let Err(source) = self.audit.record(draft).await {
            let rolled_back = matches!(
                self.store.delete_credential(&credential.id).await,
                Ok(Some(_))
            );
            return Err(ConsoleError::AuditWrite {
                source,
                rolled_back,
            });
        }

        tracing::info!(
            credential = %credential.id,
            actor = %ctx.actor().id,
            "credential created"
        );
        Ok(credential.summary())
    }

    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<CredentialSummary>> {
        self.guard.authorize(ctx.actor(), Operation::CredentialList)?;
        Ok(self.store.list_credential_summaries().await?)
    }

    /// Decrypt and return one credential. Every successful call leaves
    /// exactly one `read` entry in the trail.
    pub async fn read_secret(
        &self,
        ctx: &RequestContext,
        id: &CredentialId,
    ) -> Result<CredentialFull> {
        self.guard
            .authorize(ctx.actor(), Operation::CredentialReadSecret)?;

        let credential = self
            .store
            .get_credential(id)
            .await?
            .ok_or_else(|| ConsoleError::not_found(ResourceType::Credential, id))?;

        let draft = AuditDraft::new(
            ctx.actor(),
            AuditAction::Read,
            ResourceType::Credential,
            id.to_string(),
        )
        .origin(ctx.origin());

        let mut secret = match self.cipher.open_utf8(&credential.secret) {
            Ok(secret) => secret,
            Err(PermsError::Decryption(reason)) => {
                tracing::error!(credential = %id, %reason, "stored secret failed to open");
                let failure = draft
                    .outcome(AuditOutcome::Failure)
                    .detail(json!({ "error": "decryption" }));
                if let Err(source) = self.audit.record(failure).await {
                    return Err(ConsoleError::AuditWrite {
                        source,
                        rolled_back: true,
                    });
                }
                return Err(ConsoleError::Decryption);
            }
            Err(other) => return Err(other.into()),
        };

        if let Err(source) = self.audit.record(draft).await {
            secret.zeroize();
            return Err(ConsoleError::AuditWrite {
                source,
                rolled_back: true,
            });
        }

        tracing::info!(credential = %id, actor = %ctx.actor().id, "credential secret read");
        Ok(CredentialFull {
            summary: credential.summary(),
            secret,
        })
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &CredentialId) -> Result<()> {
        self.guard.authorize(ctx.actor(), Operation::CredentialDelete)?;

        let removed = self
            .store
            .delete_credential(id)
            .await?
            .ok_or_else(|| ConsoleError::not_found(ResourceType::Credential, id))?;

        let draft = AuditDraft::new(
            ctx.actor(),
            AuditAction::Delete,
            ResourceType::Credential,
            id.to_string(),
        )
        .origin(ctx.origin())
        .detail(json!({ "title": removed.title }));

        if let Err(source) = self.audit.record(draft).await {
            let rolled_back = matches!(
                self.store.insert_credential(&removed).await,
                Ok(InsertResult::Inserted)
            );
            return Err(ConsoleError::AuditWrite {
                source,
                rolled_back,
            });
        }

        tracing::info!(credential = %id, actor = %ctx.actor().id, "credential deleted");
        Ok(())
    }
}

fn validate(input: &NewCredential) -> Result<()> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ConsoleError::Validation("title must not be empty".into()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ConsoleError::Validation(format!(
            "title is longer than {} bytes",
            MAX_TITLE_LEN
        )));
    }
    if input.secret.is_empty() {
        return Err(ConsoleError::Validation("secret must not be empty".into()));
    }
    if input.secret.len() > MAX_SECRET_LEN {
        return Err(ConsoleError::Validation(format!(
            "secret is {} bytes, limit is {}",
            input.secret.len(),
            MAX_SECRET_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdeck_core::{Actor, ActorId, AuditQuery, Role};
    use opsdeck_perms::CipherKey;
    use opsdeck_store::MemoryStore;

    fn service() -> (CredentialService<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cipher = Arc::new(CipherEngine::new(CipherKey::generate()));
        let audit = AuditRecorder::new(store.clone());
        (CredentialService::new(store.clone(), cipher, audit), store)
    }

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new(Actor::new(ActorId::generate(), "op", role), None)
    }

    #[tokio::test]
    async fn test_validation_rejects_blank_title_and_empty_secret() {
        let (svc, store) = service();
        let admin = ctx(Role::Admin);

        for input in [
            NewCredential::new("   ", "pw"),
            NewCredential::new("db", ""),
            NewCredential::new("x".repeat(MAX_TITLE_LEN + 1), "pw"),
            NewCredential::new("db", "x".repeat(MAX_SECRET_LEN + 1)),
        ] {
            assert!(matches!(
                svc.create(&admin, input).await,
                Err(ConsoleError::Validation(_))
            ));
        }
        assert!(store.list_credential_summaries().await.unwrap().is_empty());
        assert!(store.audit_trail().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_title_is_trimmed() {
        let (svc, _) = service();
        let summary = svc
            .create(&ctx(Role::SystemManager), NewCredential::new("  db  ", "pw"))
            .await
            .unwrap();
        assert_eq!(summary.title, "db");
    }

    #[tokio::test]
    async fn test_delete_is_audited_with_title() {
        let (svc, store) = service();
        let admin = ctx(Role::Admin);
        let summary = svc
            .create(&admin, NewCredential::new("old", "pw"))
            .await
            .unwrap();

        svc.delete(&admin, &summary.id).await.unwrap();
        assert!(matches!(
            svc.delete(&admin, &summary.id).await,
            Err(ConsoleError::NotFound { .. })
        ));

        let deletes = store
            .query_audit(&AuditQuery::all().action(AuditAction::Delete))
            .await
            .unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].detail, json!({ "title": "old" }));
    }

    #[tokio::test]
    async fn test_system_manager_cannot_delete() {
        let (svc, store) = service();
        let summary = svc
            .create(&ctx(Role::Admin), NewCredential::new("keep", "pw"))
            .await
            .unwrap();
        assert!(matches!(
            svc.delete(&ctx(Role::SystemManager), &summary.id).await,
            Err(ConsoleError::Forbidden)
        ));
        assert!(store.get_credential(&summary.id).await.unwrap().is_some());
    }
}
