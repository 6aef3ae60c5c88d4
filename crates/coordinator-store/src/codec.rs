//! JSON encode/decode helpers shared by every table. Teacher convention
//! (`knhk-lockchain::storage`) used `bincode` over a single flat tree with
//! zero-padded numeric keys; we use JSON here because every entity embeds
//! `serde_json::Value` payloads (raw feed/model output) that bincode cannot
//! round-trip without a schema, and because the reporting API re-serializes
//! these same structs as JSON anyway.

use crate::error::{StoreError, StoreResult};
use serde::{de::DeserializeOwned, Serialize};

pub fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Zero-padded decimal key so lexicographic `sled` ordering matches numeric
/// ordering, mirroring the teacher's `format!("root:{:020}", cycle)`
/// convention.
pub fn padded_seq(n: u64) -> String {
    format!("{n:020}")
}

pub(crate) fn get_typed<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> StoreResult<Option<T>> {
    match tree.get(key.as_bytes())? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn put_typed<T: Serialize>(tree: &sled::Tree, key: &str, value: &T) -> StoreResult<()> {
    tree.insert(key.as_bytes(), encode(value)?)?;
    Ok(())
}

pub(crate) fn scan_all<T: DeserializeOwned>(tree: &sled::Tree) -> StoreResult<Vec<T>> {
    let mut out = Vec::new();
    for entry in tree.iter() {
        let (_k, v) = entry?;
        out.push(decode(&v)?);
    }
    Ok(out)
}

pub(crate) fn scan_prefix<T: DeserializeOwned>(tree: &sled::Tree, prefix: &str) -> StoreResult<Vec<T>> {
    let mut out = Vec::new();
    for entry in tree.scan_prefix(prefix.as_bytes()) {
        let (_k, v) = entry?;
        out.push(decode(&v)?);
    }
    Ok(out)
}
