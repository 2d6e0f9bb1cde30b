//! The cipher engine: seal and open secrets under the process key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use opsdeck_core::SealedSecret;

use crate::envelope::{self, EncryptionFormat, NONCE_LEN};
use crate::error::{PermsError, Result};

/// Largest plaintext the engine will seal (64 KiB).
pub const MAX_SECRET_LEN: usize = 64 * 1024;

/// The process-wide 256-bit secret key.
///
/// Wiped from memory on drop. There is no accessor for the raw bytes and
/// `Debug` never prints them.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey([u8; 32]);

impl CipherKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex key, as supplied by configuration.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(s.trim()).map_err(|e| PermsError::InvalidKey(e.to_string()))?,
        );
        let arr: [u8; 32] = bytes[..]
            .try_into()
            .map_err(|_| PermsError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(<redacted>)")
    }
}

/// Symmetric sealing of secret strings.
///
/// `open(seal(x)) == x` for every `x` up to [`MAX_SECRET_LEN`], and two
/// seals of the same `x` never produce the same value.
#[derive(Clone)]
pub struct CipherEngine {
    cipher: XChaCha20Poly1305,
}

impl CipherEngine {
    /// Build an engine around the injected key. The key is consumed.
    pub fn new(key: CipherKey) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key.0)),
        }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedSecret> {
        if plaintext.len() > MAX_SECRET_LEN {
            return Err(PermsError::SecretTooLarge {
                len: plaintext.len(),
                max: MAX_SECRET_LEN,
            });
        }

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(&extended_nonce(&nonce), plaintext)
            .map_err(|e| PermsError::Encryption(e.to_string()))?;

        Ok(envelope::encode(
            EncryptionFormat::XChaCha20Poly1305,
            &nonce,
            &ciphertext,
        ))
    }

    /// Decrypt and authenticate a sealed value.
    ///
    /// Malformed text, a short or unknown envelope, a wrong key and a
    /// failed tag all surface as [`PermsError::Decryption`].
    pub fn open(&self, sealed: &SealedSecret) -> Result<Zeroizing<Vec<u8>>> {
        let bytes = sealed
            .to_bytes()
            .map_err(|_| PermsError::Decryption("sealed value is not valid hex".into()))?;
        let env = envelope::decode(&bytes)?;
        match env.format {
            EncryptionFormat::XChaCha20Poly1305 => self
                .cipher
                .decrypt(&extended_nonce(env.nonce), env.ciphertext)
                .map(Zeroizing::new)
                .map_err(|_| PermsError::Decryption("authentication failed".into())),
        }
    }

    /// Open a value that was sealed from UTF-8 text.
    pub fn open_utf8(&self, sealed: &SealedSecret) -> Result<String> {
        let plaintext = self.open(sealed)?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|_| PermsError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

/// The stored 128-bit nonce is the HChaCha20 input; the trailing 64-bit
/// ChaCha20 nonce is zero, as every derived subkey seals a single value.
fn extended_nonce(nonce: &[u8; NONCE_LEN]) -> XNonce {
    let mut full = XNonce::default();
    full[..NONCE_LEN].copy_from_slice(nonce);
    full
}

impl fmt::Debug for CipherEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherEngine { .. }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seal_open() {
        let engine = CipherEngine::new(CipherKey::generate());
        let sealed = engine.seal(b"s3cr3t!").unwrap();
        assert_ne!(sealed.to_bytes().unwrap(), b"s3cr3t!");
        assert_eq!(engine.open_utf8(&sealed).unwrap(), "s3cr3t!");
    }

    #[test]
    fn test_seal_empty() {
        let engine = CipherEngine::new(CipherKey::generate());
        let sealed = engine.seal(b"").unwrap();
        assert!(engine.open(&sealed).unwrap().is_empty());
    }

    #[test]
    fn test_seal_is_not_deterministic() {
        let engine = CipherEngine::new(CipherKey::generate());
        let a = engine.seal(b"same input").unwrap();
        let b = engine.seal(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_wrong_key_fails() {
        let sealer = CipherEngine::new(CipherKey::generate());
        let other = CipherEngine::new(CipherKey::generate());
        let sealed = sealer.seal(b"secret").unwrap();
        assert!(matches!(other.open(&sealed), Err(PermsError::Decryption(_))));
    }

    #[test]
    fn test_malformed_stored_text_is_a_decryption_error() {
        let engine = CipherEngine::new(CipherKey::generate());
        for text in ["zz-not-hex", "abc", ""] {
            let sealed = SealedSecret::from_hex(text);
            assert!(matches!(engine.open(&sealed), Err(PermsError::Decryption(_))));
        }
    }

    #[test]
    fn test_sealed_layout_carries_a_128_bit_nonce() {
        let engine = CipherEngine::new(CipherKey::generate());
        let sealed = engine.seal(b"abc").unwrap();
        assert_eq!(sealed.len(), 1 + 16 + 3 + 16);

        let a = engine.seal(b"abc").unwrap().to_bytes().unwrap();
        let b = engine.seal(b"abc").unwrap().to_bytes().unwrap();
        assert_ne!(a[1..17], b[1..17]);
    }

    #[test]
    fn test_oversized_secret_rejected() {
        let engine = CipherEngine::new(CipherKey::generate());
        let big = vec![0u8; MAX_SECRET_LEN + 1];
        assert!(matches!(
            engine.seal(&big),
            Err(PermsError::SecretTooLarge { .. })
        ));
    }

    #[test]
    fn test_key_from_hex() {
        let key = CipherKey::from_hex(&"ab".repeat(32)).unwrap();
        let engine = CipherEngine::new(key);
        let again = CipherEngine::new(CipherKey::from_bytes([0xab; 32]));
        let sealed = engine.seal(b"x").unwrap();
        assert_eq!(&again.open(&sealed).unwrap()[..], b"x");

        assert!(CipherKey::from_hex("abcd").is_err());
        assert!(CipherKey::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = CipherKey::from_bytes([0xab; 32]);
        assert!(!format!("{:?}", key).contains("ab, "));
        assert!(!format!("{:?}", key).contains("abab"));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..2048)) {
            let engine = CipherEngine::new(CipherKey::from_bytes([0x42; 32]));
            let sealed = engine.seal(&plaintext).unwrap();
            prop_assert_eq!(&engine.open(&sealed).unwrap()[..], &plaintext[..]);
        }

        #[test]
        fn prop_any_byte_flip_is_detected(
            plaintext in prop::collection::vec(any::<u8>(), 0..256),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let engine = CipherEngine::new(CipherKey::from_bytes([0x42; 32]));
            let sealed = engine.seal(&plaintext).unwrap();

            let mut bytes = sealed.to_bytes().unwrap();
            let i = index.index(bytes.len());
            bytes[i] ^= flip;

            let tampered = SealedSecret::from_bytes(bytes);
            prop_assert!(matches!(engine.open(&tampered), Err(PermsError::Decryption(_))));
        }

        #[test]
        fn prop_truncation_is_detected(
            plaintext in prop::collection::vec(any::<u8>(), 1..256),
            cut in 1usize..16,
        ) {
            let engine = CipherEngine::new(CipherKey::from_bytes([0x42; 32]));
            let sealed = engine.seal(&plaintext).unwrap();
            let bytes = sealed.to_bytes().unwrap();
            let tampered = SealedSecret::from_bytes(&bytes[..bytes.len() - cut]);
            prop_assert!(engine.open(&tampered).is_err());
        }
    }
}
