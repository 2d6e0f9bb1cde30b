//! Credential records and the views handed out of the store.
//!
//! There are three shapes of a credential:
//!
//! - [`Credential`]: the stored record, secret sealed
//! - [`CredentialSummary`]: the list view, secret omitted entirely
//! - [`CredentialFull`]: the single-record read view, secret in plaintext

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actor::Actor;
use crate::types::{ActorId, CredentialId, SealedSecret};

/// Who created a credential, captured at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRef {
    pub id: ActorId,
    pub name: String,
}

impl From<&Actor> for CreatorRef {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            name: actor.name.clone(),
        }
    }
}

/// A stored credential. The secret only ever exists here in sealed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: CredentialId,
    pub title: String,
    pub username: Option<String>,
    pub secret: SealedSecret,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub creator: CreatorRef,
    pub created_at: i64,
}

impl Credential {
    /// Project out the secret.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id,
            title: self.title.clone(),
            username: self.username.clone(),
            url: self.url.clone(),
            notes: self.notes.clone(),
            creator: self.creator.clone(),
            created_at: self.created_at,
        }
    }
}

/// Credential without its secret. Safe to list and serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: CredentialId,
    pub title: String,
    pub username: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub creator: CreatorRef,
    pub created_at: i64,
}

/// Credential with its decrypted secret. Returned one record at a time.
#[derive(Clone, Serialize)]
pub struct CredentialFull {
    #[serde(flatten)]
    pub summary: CredentialSummary,
    pub secret: String,
}

impl fmt::Debug for CredentialFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFull")
            .field("summary", &self.summary)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Input for creating a credential.
#[derive(Clone, Default)]
pub struct NewCredential {
    pub title: String,
    pub username: Option<String>,
    pub secret: String,
    pub url: Option<String>,
    pub notes: Option<String>,
}

impl NewCredential {
    pub fn new(title: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("url", &self.url)
            .field("notes", &self.notes)
            .finish()
    }
}
