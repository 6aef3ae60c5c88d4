//! Canonical JSON encoding and content hashing.
//!
//! `content_hash` is used for Snapshot leaves (spec §3, §4.3 Phase C) and
//! anywhere else a deterministic, cross-run-stable digest of a JSON-shaped
//! value is needed. Canonicalization relies on `serde_json::Value`'s default
//! map representation being a `BTreeMap` (the `preserve_order` feature is
//! never enabled in this workspace), so converting through `Value` already
//! sorts object keys; compact (non-pretty) encoding gives minimal separators.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest rendered as lowercase hex, as stored on `Snapshot.content_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

#[derive(Debug, thiserror::Error)]
pub enum ContentHashParseError {
    #[error(transparent)]
    InvalidHex(#[from] hex::FromHexError),
    #[error("decoded {len} bytes, a ContentHash is exactly 32")]
    WrongLength { len: usize },
}

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Errors on anything that isn't exactly 32 bytes of hex, rather than
    /// silently zero-padding a corrupted or truncated stored hash into the
    /// all-zero leaf.
    pub fn from_hex(s: &str) -> Result<Self, ContentHashParseError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(ContentHashParseError::WrongLength { len: bytes.len() });
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Serialize `value` through `serde_json::Value` (sorting object keys) and
/// encode compactly. Returns the canonical byte string that gets hashed.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let as_value = serde_json::to_value(value)?;
    serde_json::to_vec(&as_value)
}

/// SHA-256 of the canonical JSON encoding of `value`.
pub fn content_hash<T: Serialize>(value: &T) -> serde_json::Result<ContentHash> {
    let bytes = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(ContentHash(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a).unwrap().to_hex(), content_hash(&b).unwrap().to_hex());
    }

    #[test]
    fn stable_across_runs() {
        let v = json!({"model_id": "m1", "prediction_count": 3});
        let h1 = content_hash(&v).unwrap();
        let h2 = content_hash(&v).unwrap();
        assert_eq!(h1.to_hex(), h2.to_hex());
    }

    #[test]
    fn hex_round_trips() {
        let v = json!({"x": 1});
        let h = content_hash(&v).unwrap();
        let parsed = ContentHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h.0, parsed.0);
    }

    #[test]
    fn truncated_hash_is_an_error_not_a_zero_leaf() {
        let err = ContentHash::from_hex("abcd").unwrap_err();
        assert!(matches!(err, ContentHashParseError::WrongLength { len: 2 }));
    }

    #[test]
    fn invalid_hex_characters_are_an_error() {
        assert!(ContentHash::from_hex("not hex at all").is_err());
    }
}
