//! Proptest generators for property-based testing.

use proptest::prelude::*;

use opsdeck_core::{AuditAction, NewCredential, ResourceType, Role};
use opsdeck_perms::Operation;

/// Any role.
pub fn role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

/// Any guarded operation.
pub fn operation() -> impl Strategy<Value = Operation> {
    prop::sample::select(Operation::ALL.to_vec())
}

pub fn audit_action() -> impl Strategy<Value = AuditAction> {
    prop::sample::select(AuditAction::ALL.to_vec())
}

pub fn resource_type() -> impl Strategy<Value = ResourceType> {
    prop_oneof![
        Just(ResourceType::Credential),
        Just(ResourceType::Server),
        Just(ResourceType::User),
    ]
}

/// A title that survives trimming.
pub fn title() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 ._-]{0,39}".prop_map(|s| s.trim_end().to_string())
}

/// A non-empty secret of printable text, including non-ASCII.
pub fn secret() -> impl Strategy<Value = String> {
    "\\PC{1,128}"
}

/// Secret bytes up to `max_len`.
pub fn secret_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Valid credential input with optional fields filled at random.
pub fn new_credential() -> impl Strategy<Value = NewCredential> {
    (
        title(),
        secret(),
        proptest::option::of("[a-z]{1,16}"),
        proptest::option::of("https://[a-z]{1,12}\\.example"),
        proptest::option::of("[ -~]{0,64}"),
    )
        .prop_map(|(title, secret, username, url, notes)| NewCredential {
            title,
            username,
            secret,
            url,
            notes,
        })
}
