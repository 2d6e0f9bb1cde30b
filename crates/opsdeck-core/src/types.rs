//! Strong type definitions for opsdeck.
//!
//! All identifiers are newtypes to prevent mixing a server id with a
//! credential id at compile time.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

macro_rules! random_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            /// Generate a new random identifier.
            pub fn generate() -> Self {
                let mut bytes = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes = hex::decode(s).map_err(|e| CoreError::InvalidId(e.to_string()))?;
                let arr: [u8; 16] = bytes.try_into().map_err(|_| {
                    CoreError::InvalidId(format!("{} must be 16 bytes", stringify!($name)))
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex(s)
            }
        }
    };
}

random_id! {
    /// Opaque, unique identifier of a stored credential.
    CredentialId
}

random_id! {
    /// Identifier of a managed server.
    ServerId
}

random_id! {
    /// Identifier of an authenticated actor.
    ActorId
}

/// The stored form of a secret: the hex text of an opaque sealed blob.
///
/// Produced by the cipher engine; never equal to the plaintext. The text is
/// carried as loaded and only decoded when the engine opens it, so a
/// damaged value fails at open time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedSecret(String);

impl SealedSecret {
    /// Wrap raw sealed bytes.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self(hex::encode(bytes))
    }

    /// Wrap stored hex text without checking it.
    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The hex text form used for durable storage.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.clone()
    }

    /// Decode the sealed bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.0)
            .map_err(|e| CoreError::EncodingError(format!("sealed secret: {}", e)))
    }

    /// Length of the sealed value in bytes.
    pub fn len(&self) -> usize {
        self.0.len() / 2
    }

    /// Whether the sealed value is empty (never true for engine output).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedSecret({} bytes)", self.0.len())
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_id_hex_roundtrip() {
        let id = CredentialId::from_bytes([0x42; 16]);
        let recovered = CredentialId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_id_rejects_wrong_length() {
        assert!(ServerId::from_hex("abcd").is_err());
        assert!(ServerId::from_hex("not hex").is_err());
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(ActorId::generate(), ActorId::generate());
    }

    #[test]
    fn test_sealed_secret_debug_hides_bytes() {
        let sealed = SealedSecret::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let debug = format!("{:?}", sealed);
        assert_eq!(debug, "SealedSecret(4 bytes)");
        assert!(!debug.contains("dead"));
    }

    #[test]
    fn test_sealed_secret_keeps_malformed_text_until_decoded() {
        let sealed = SealedSecret::from_hex("zz-not-hex");
        assert_eq!(sealed.as_hex(), "zz-not-hex");
        assert!(matches!(sealed.to_bytes(), Err(CoreError::EncodingError(_))));

        let good = SealedSecret::from_bytes([1u8, 2, 3]);
        assert_eq!(good.as_hex(), "010203");
        assert_eq!(good.to_bytes().unwrap(), vec![1, 2, 3]);
    }
}
