//! The access policy guard.
//!
//! The guard runs first in every guarded call. It owns no data and touches
//! nothing: a denial returns before any lookup, mutation or audit write.

use opsdeck_core::Actor;

use crate::error::{PermsError, Result};
use crate::policy::{check, Operation, Verdict};

/// Stateless gate in front of every sensitive operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGuard;

impl AccessGuard {
    pub const fn new() -> Self {
        Self
    }

    /// Allow the call or fail with [`PermsError::Forbidden`].
    pub fn authorize(&self, actor: &Actor, operation: Operation) -> Result<()> {
        match check(actor.role, operation) {
            Verdict::Allow => Ok(()),
            Verdict::Deny => {
                tracing::warn!(
                    actor = %actor.id,
                    operation = operation.as_str(),
                    "access denied"
                );
                Err(PermsError::Forbidden)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdeck_core::{ActorId, Role};

    #[test]
    fn test_authorize_allows() {
        let actor = Actor::new(ActorId::generate(), "root", Role::Admin);
        assert!(AccessGuard::new()
            .authorize(&actor, Operation::CredentialDelete)
            .is_ok());
    }

    #[test]
    fn test_denial_carries_no_detail() {
        let actor = Actor::new(ActorId::generate(), "bob", Role::TechnicalSupport);
        let err = AccessGuard::new()
            .authorize(&actor, Operation::CredentialReadSecret)
            .unwrap_err();
        assert!(matches!(err, PermsError::Forbidden));

        let message = err.to_string();
        assert_eq!(message, "forbidden");
        for role in Role::ALL {
            assert!(!message.contains(role.as_str()));
        }
    }
}
