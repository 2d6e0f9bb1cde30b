//! # opsdeck Permissions
//!
//! Role-based access control and field-level encryption of secrets.
//!
//! ## Access Policy
//!
//! Every guarded call names an [`Operation`]. The policy is a static, total
//! table from operation to permitted roles, decided at compile time:
//!
//! ```rust
//! use opsdeck_perms::{check, Operation, Verdict};
//! use opsdeck_core::Role;
//!
//! assert_eq!(check(Role::Admin, Operation::CredentialReadSecret), Verdict::Allow);
//! assert_eq!(check(Role::Staff, Operation::CredentialReadSecret), Verdict::Deny);
//! ```
//!
//! [`AccessGuard::authorize`] turns a denial into [`PermsError::Forbidden`],
//! which says nothing beyond the fact of denial.
//!
//! ## Encryption Model
//!
//! Secrets are sealed with XChaCha20-Poly1305 under one process-wide key:
//!
//! 1. **Key**: 256 bits, injected at construction, zeroized on drop
//! 2. **Nonce**: 128 random bits, fresh for every seal
//! 3. **Envelope**: `format || nonce || ciphertext+tag`, self-contained
//!
//! ```rust
//! use opsdeck_perms::{CipherEngine, CipherKey};
//!
//! let engine = CipherEngine::new(CipherKey::generate());
//! let sealed = engine.seal(b"s3cr3t!").unwrap();
//! assert_eq!(&engine.open(&sealed).unwrap()[..], b"s3cr3t!");
//! ```

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod policy;

pub use cipher::{CipherEngine, CipherKey, MAX_SECRET_LEN};
pub use envelope::{EncryptionFormat, NONCE_LEN, TAG_LEN};
pub use error::{PermsError, Result};
pub use guard::AccessGuard;
pub use policy::{check, permitted_roles, Operation, Verdict};
