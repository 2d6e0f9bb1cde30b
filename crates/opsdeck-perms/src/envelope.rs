//! Sealed value envelope.
//!
//! A sealed secret is laid out as:
//!
//! ```text
//! +--------+-----------------+------------------------------+
//! | format |  nonce (16 B)   |  ciphertext || tag (16 B)    |
//! +--------+-----------------+------------------------------+
//! ```
//!
//! The format byte leaves room for a future key version or algorithm
//! without guessing from the length.

use opsdeck_core::SealedSecret;

use crate::error::{PermsError, Result};

/// Stored nonce length: 128 random bits per sealed value.
pub const NONCE_LEN: usize = 16;

/// Poly1305 tag length.
pub const TAG_LEN: usize = 16;

/// Format identifier for sealed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// XChaCha20-Poly1305 under the process key.
    XChaCha20Poly1305 = 1,
}

impl EncryptionFormat {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(EncryptionFormat::XChaCha20Poly1305),
            _ => None,
        }
    }
}

/// Borrowed view of a decoded envelope.
pub(crate) struct Envelope<'a> {
    pub format: EncryptionFormat,
    pub nonce: &'a [u8; NONCE_LEN],
    pub ciphertext: &'a [u8],
}

pub(crate) fn encode(
    format: EncryptionFormat,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> SealedSecret {
    let mut buf = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    buf.push(format as u8);
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(ciphertext);
    SealedSecret::from_bytes(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Envelope<'_>> {
    if bytes.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(PermsError::Decryption("sealed value too short".into()));
    }

    let format = EncryptionFormat::from_u8(bytes[0])
        .ok_or_else(|| PermsError::Decryption(format!("unknown format {}", bytes[0])))?;

    let nonce: &[u8; NONCE_LEN] = bytes[1..1 + NONCE_LEN]
        .try_into()
        .map_err(|_| PermsError::Decryption("invalid nonce length".into()))?;

    Ok(Envelope {
        format,
        nonce,
        ciphertext: &bytes[1 + NONCE_LEN..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_layout() {
        let nonce = [0x11; NONCE_LEN];
        let sealed = encode(EncryptionFormat::XChaCha20Poly1305, &nonce, &[0x22; 20]);
        assert_eq!(NONCE_LEN * 8, 128);
        assert_eq!(sealed.len(), 1 + 16 + 20);

        let bytes = sealed.to_bytes().unwrap();
        let env = decode(&bytes).unwrap();
        assert_eq!(env.format, EncryptionFormat::XChaCha20Poly1305);
        assert_eq!(env.nonce, &nonce);
        assert_eq!(env.ciphertext, &[0x22; 20]);
    }

    #[test]
    fn test_decode_rejects_short() {
        let bytes = vec![1; NONCE_LEN + TAG_LEN];
        assert!(matches!(decode(&bytes), Err(PermsError::Decryption(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_format() {
        let bytes = vec![9; 1 + NONCE_LEN + TAG_LEN];
        assert!(matches!(decode(&bytes), Err(PermsError::Decryption(_))));
    }
}
