//! Canonical CBOR encoding for audit entry hashing.
//!
//! Follows RFC 8949 Core Deterministic Encoding for the subset of CBOR
//! the audit trail uses:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds; detail payloads are
//!   embedded as their sorted-key JSON text)
//!
//! The same entry must produce identical bytes whether it was just built
//! in memory or read back from SQLite, otherwise the chain would not verify.

use ciborium::value::{Integer, Value};

use crate::audit::{AuditLogEntry, ChainHash};
use crate::error::{CoreError, Result};

/// Entry field keys (integer keys for compact encoding).
mod keys {
    pub const SEQ: u64 = 0;
    pub const TIMESTAMP: u64 = 1;
    pub const ACTOR_ID: u64 = 2;
    pub const ACTOR_NAME: u64 = 3;
    pub const ACTOR_ROLE: u64 = 4;
    pub const ACTION: u64 = 5;
    pub const RESOURCE_TYPE: u64 = 6;
    pub const RESOURCE_ID: u64 = 7;
    pub const ORIGIN: u64 = 8;
    pub const OUTCOME: u64 = 9;
    pub const DETAIL: u64 = 10;
    pub const PREV_HASH: u64 = 11;
}

/// Encode every hashed field of an entry (everything except `entry_hash`).
pub fn canonical_entry_bytes(entry: &AuditLogEntry) -> Result<Vec<u8>> {
    let detail = serde_json::to_string(&entry.detail)
        .map_err(|e| CoreError::EncodingError(format!("audit detail: {}", e)))?;

    let entries = vec![
        (key(keys::SEQ), Value::Integer(entry.seq.into())),
        (key(keys::TIMESTAMP), Value::Integer(entry.timestamp.into())),
        (key(keys::ACTOR_ID), Value::Bytes(entry.actor_id.0.to_vec())),
        (key(keys::ACTOR_NAME), Value::Text(entry.actor_name.clone())),
        (key(keys::ACTOR_ROLE), Value::Text(entry.actor_role.as_str().into())),
        (key(keys::ACTION), Value::Text(entry.action.as_str().into())),
        (
            key(keys::RESOURCE_TYPE),
            Value::Text(entry.resource_type.as_str().into()),
        ),
        (key(keys::RESOURCE_ID), Value::Text(entry.resource_id.clone())),
        (
            key(keys::ORIGIN),
            match &entry.origin {
                Some(ip) => Value::Text(ip.clone()),
                None => Value::Null,
            },
        ),
        (key(keys::OUTCOME), Value::Text(entry.outcome.as_str().into())),
        (key(keys::DETAIL), Value::Text(detail)),
        (key(keys::PREV_HASH), chain_hash_value(&entry.prev_hash)),
    ];

    let mut buf = Vec::new();
    encode_value_to(&mut buf, &Value::Map(entries))?;
    Ok(buf)
}

fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

fn chain_hash_value(hash: &ChainHash) -> Value {
    Value::Bytes(hash.as_bytes().to_vec())
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value in canonical encoding".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_encoding_sizes() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);
    }

    #[test]
    fn test_negative_integer() {
        let mut buf = Vec::new();
        encode_integer(&mut buf, Integer::from(-1i64));
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_map_keys_sorted() {
        let map = Value::Map(vec![
            (key(10), Value::Null),
            (key(1), Value::Bool(true)),
        ]);
        let mut buf = Vec::new();
        encode_value_to(&mut buf, &map).unwrap();
        assert_eq!(buf, vec![0xa2, 0x01, 0xf5, 0x0a, 0xf6]);
    }

    #[test]
    fn test_float_rejected() {
        let mut buf = Vec::new();
        assert!(encode_value_to(&mut buf, &Value::Float(1.5)).is_err());
    }
}
