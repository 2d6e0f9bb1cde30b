//! The static access policy.
//!
//! Operations are (resource-type, action) pairs. The table mapping each
//! operation to the roles allowed to perform it is an exhaustive `match`, so
//! adding an operation without deciding who may perform it does not compile.

use serde::{Deserialize, Serialize};
use std::fmt;

use opsdeck_core::Role;

/// A guarded (resource-type, action) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CredentialCreate,
    CredentialList,
    CredentialReadSecret,
    CredentialDelete,
    ServerCreate,
    ServerList,
    ServerPing,
    ServerScript,
    AuditQuery,
    AuditVerify,
}

impl Operation {
    /// Every defined operation.
    pub const ALL: [Operation; 10] = [
        Operation::CredentialCreate,
        Operation::CredentialList,
        Operation::CredentialReadSecret,
        Operation::CredentialDelete,
        Operation::ServerCreate,
        Operation::ServerList,
        Operation::ServerPing,
        Operation::ServerScript,
        Operation::AuditQuery,
        Operation::AuditVerify,
    ];

    /// Dotted name, e.g. `Credential.readSecret`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::CredentialCreate => "Credential.create",
            Operation::CredentialList => "Credential.list",
            Operation::CredentialReadSecret => "Credential.readSecret",
            Operation::CredentialDelete => "Credential.delete",
            Operation::ServerCreate => "Server.create",
            Operation::ServerList => "Server.list",
            Operation::ServerPing => "Server.ping",
            Operation::ServerScript => "Server.script",
            Operation::AuditQuery => "Audit.query",
            Operation::AuditVerify => "Audit.verify",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Roles permitted to perform `operation`. Never empty.
pub const fn permitted_roles(operation: Operation) -> &'static [Role] {
    use Role::*;

    match operation {
        Operation::CredentialCreate => &[Admin, SystemManager],
        Operation::CredentialList => &[Admin, SystemManager, TechnicalSupport],
        Operation::CredentialReadSecret => &[Admin, SystemManager],
        Operation::CredentialDelete => &[Admin],
        Operation::ServerCreate => &[Admin, SystemManager],
        Operation::ServerList => &[Admin, SystemManager, TechnicalSupport],
        Operation::ServerPing => &[Admin, SystemManager, TechnicalSupport],
        Operation::ServerScript => &[Admin, SystemManager],
        Operation::AuditQuery => &[Admin],
        Operation::AuditVerify => &[Admin],
    }
}

/// Pure policy evaluation.
pub fn check(role: Role, operation: Operation) -> Verdict {
    if permitted_roles(operation).contains(&role) {
        Verdict::Allow
    } else {
        Verdict::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_every_operation_has_a_role() {
        for op in Operation::ALL {
            assert!(!permitted_roles(op).is_empty(), "{} has no roles", op);
        }
    }

    #[test]
    fn test_admin_allowed_everything() {
        for op in Operation::ALL {
            assert_eq!(check(Role::Admin, op), Verdict::Allow);
        }
    }

    #[test]
    fn test_staff_denied_everything() {
        for op in Operation::ALL {
            assert_eq!(check(Role::Staff, op), Verdict::Deny);
        }
    }

    #[test]
    fn test_support_cannot_read_secrets() {
        assert_eq!(
            check(Role::TechnicalSupport, Operation::CredentialList),
            Verdict::Allow
        );
        assert_eq!(
            check(Role::TechnicalSupport, Operation::CredentialReadSecret),
            Verdict::Deny
        );
        assert_eq!(
            check(Role::TechnicalSupport, Operation::ServerScript),
            Verdict::Deny
        );
    }

    #[test]
    fn test_only_admin_deletes() {
        assert_eq!(
            check(Role::SystemManager, Operation::CredentialDelete),
            Verdict::Deny
        );
    }

    fn role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn operation() -> impl Strategy<Value = Operation> {
        prop::sample::select(Operation::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_check_is_pure(role in role(), op in operation()) {
            let first = check(role, op);
            for _ in 0..8 {
                prop_assert_eq!(check(role, op), first);
            }
        }

        #[test]
        fn prop_check_agrees_with_table(role in role(), op in operation()) {
            prop_assert_eq!(
                check(role, op).is_allowed(),
                permitted_roles(op).contains(&role)
            );
        }
    }
}
