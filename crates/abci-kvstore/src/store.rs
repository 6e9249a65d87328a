//! Committed state encoding and hashing.
//!
//! Snapshot payload layout:
//! - 8 bytes: height (big-endian)
//! - 4 bytes: entry count (big-endian)
//! - per entry, in key order: 4-byte key length, key, 4-byte value length, value

use crate::error::{KvStoreError, Result};
use bytes::{Buf, BufMut, Bytes};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Key/value contents, ordered by key.
pub type Store = BTreeMap<Bytes, Bytes>;

/// Result code for malformed transactions.
pub const CODE_INVALID_TX: u32 = 1;

/// Result code for queries on an unknown path.
pub const CODE_UNKNOWN_PATH: u32 = 2;

/// Splits a transaction into its key and value.
///
/// `key=value` stores `value` under `key`; a transaction without `=` is
/// stored under itself. Empty transactions, empty keys and transactions
/// with more than one `=` are invalid.
pub fn parse_tx(tx: &[u8]) -> Option<(Bytes, Bytes)> {
    if tx.is_empty() {
        return None;
    }
    let mut parts = tx.splitn(3, |byte| *byte == b'=');
    let key = parts.next()?;
    match (parts.next(), parts.next()) {
        (None, _) => Some((Bytes::copy_from_slice(tx), Bytes::copy_from_slice(tx))),
        (Some(_), Some(_)) => None,
        (Some(_), None) if key.is_empty() => None,
        (Some(value), None) => Some((Bytes::copy_from_slice(key), Bytes::copy_from_slice(value))),
    }
}

/// SHA-256 commitment over the height and every entry.
pub fn app_hash(height: u64, store: &Store) -> Bytes {
    Bytes::from(Sha256::digest(encode(height, store)).to_vec())
}

/// Serializes the height and entries.
pub fn encode(height: u64, store: &Store) -> Vec<u8> {
    let size = store.iter().map(|(k, v)| 8 + k.len() + v.len()).sum::<usize>();
    let mut buf = Vec::with_capacity(12 + size);
    buf.put_u64(height);
    buf.put_u32(store.len() as u32);
    for (key, value) in store {
        buf.put_u32(key.len() as u32);
        buf.put_slice(key);
        buf.put_u32(value.len() as u32);
        buf.put_slice(value);
    }
    buf
}

/// Parses a payload produced by [`encode`].
pub fn decode(mut payload: &[u8]) -> Result<(u64, Store)> {
    let height = read_u64(&mut payload)?;
    let count = read_u32(&mut payload)?;

    let mut store = Store::new();
    for _ in 0..count {
        let key = read_bytes(&mut payload)?;
        let value = read_bytes(&mut payload)?;
        store.insert(key, value);
    }
    if payload.has_remaining() {
        return Err(KvStoreError::MalformedSnapshot("trailing bytes"));
    }
    Ok((height, store))
}

fn read_u64(buf: &mut &[u8]) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(KvStoreError::MalformedSnapshot("truncated height"));
    }
    Ok(buf.get_u64())
}

fn read_u32(buf: &mut &[u8]) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(KvStoreError::MalformedSnapshot("truncated length"));
    }
    Ok(buf.get_u32())
}

fn read_bytes(buf: &mut &[u8]) -> Result<Bytes> {
    let len = read_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(KvStoreError::MalformedSnapshot("truncated entry"));
    }
    Ok(buf.copy_to_bytes(len))
}
