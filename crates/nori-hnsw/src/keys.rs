//! Key layout for HNSW records.
//!
//! Every record of one vector field lives under the same prefix, built from
//! the length-prefixed namespace, index name and field name:
//!
//! ```text
//! [ns][index][field] 0x01                                  -> field metadata
//! [ns][index][field] 0x02 [level: u16 BE] [node key]       -> node layer record
//! [ns][index][field] 0x03 [node key]                       -> node vector
//!
//! [x] = u32 BE length + bytes
//! ```
//!
//! Putting the level before the node key means one prefix scan lists every
//! node of a layer. The length prefix orders such a scan by key length
//! first, so callers that need key order sort the decoded keys.

use crate::{HnswError, Result};
use bytes::{Buf, BufMut, BytesMut};

const SUBKEY_FIELD_META: u8 = 0x01;
const SUBKEY_NODE: u8 = 0x02;
const SUBKEY_VECTOR: u8 = 0x03;

/// Identifies one vector field of one search index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub ns: String,
    pub index: String,
    pub field: String,
}

impl SearchKey {
    pub fn new(ns: impl Into<String>, index: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            index: index.into(),
            field: field.into(),
        }
    }

    fn prefix(&self, extra: usize) -> BytesMut {
        let mut buf = BytesMut::with_capacity(
            12 + self.ns.len() + self.index.len() + self.field.len() + extra,
        );
        put_sized(&mut buf, self.ns.as_bytes());
        put_sized(&mut buf, self.index.as_bytes());
        put_sized(&mut buf, self.field.as_bytes());
        buf
    }

    /// Key of the field metadata record.
    pub fn field_meta(&self) -> Vec<u8> {
        let mut buf = self.prefix(1);
        buf.put_u8(SUBKEY_FIELD_META);
        buf.to_vec()
    }

    /// Prefix shared by every node record on `level`.
    pub fn level_prefix(&self, level: u16) -> Vec<u8> {
        let mut buf = self.prefix(3);
        buf.put_u8(SUBKEY_NODE);
        buf.put_u16(level);
        buf.to_vec()
    }

    /// Key of the layer record of `node_key` on `level`.
    pub fn node(&self, level: u16, node_key: &str) -> Vec<u8> {
        let mut buf = self.prefix(7 + node_key.len());
        buf.put_u8(SUBKEY_NODE);
        buf.put_u16(level);
        put_sized(&mut buf, node_key.as_bytes());
        buf.to_vec()
    }

    /// Key of the vector record of `node_key`.
    pub fn vector(&self, node_key: &str) -> Vec<u8> {
        let mut buf = self.prefix(5 + node_key.len());
        buf.put_u8(SUBKEY_VECTOR);
        put_sized(&mut buf, node_key.as_bytes());
        buf.to_vec()
    }

    /// Recover the node key from a key returned by a scan of
    /// [`level_prefix`](Self::level_prefix).
    pub fn decode_node_key(&self, level: u16, key: &[u8]) -> Result<String> {
        let prefix = self.level_prefix(level);
        let mut rest = key
            .strip_prefix(prefix.as_slice())
            .ok_or_else(|| HnswError::Corruption("node key outside level prefix".to_string()))?;
        let node_key = get_sized_string(&mut rest)?;
        if rest.has_remaining() {
            return Err(HnswError::Corruption("trailing bytes after node key".to_string()));
        }
        Ok(node_key)
    }
}

/// Append `bytes` with a u32 BE length prefix.
pub(crate) fn put_sized(buf: &mut impl BufMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Read a u32 BE length-prefixed UTF-8 string.
pub(crate) fn get_sized_string(buf: &mut &[u8]) -> Result<String> {
    if buf.remaining() < 4 {
        return Err(HnswError::Corruption("truncated length prefix".to_string()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(HnswError::Corruption(format!(
            "string of {} bytes exceeds remaining {}",
            len,
            buf.remaining()
        )));
    }
    let s = std::str::from_utf8(&buf[..len])
        .map_err(|e| HnswError::Corruption(format!("invalid utf-8 key: {}", e)))?
        .to_string();
    buf.advance(len);
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sk() -> SearchKey {
        SearchKey::new("ns", "idx", "vec")
    }

    #[test]
    fn test_node_keys_share_level_prefix() {
        let sk = sk();
        let key = sk.node(3, "node1");
        assert!(key.starts_with(&sk.level_prefix(3)));
        assert!(!key.starts_with(&sk.level_prefix(2)));
        assert_eq!(sk.decode_node_key(3, &key).unwrap(), "node1");
    }

    #[test]
    fn test_fields_do_not_collide() {
        let a = SearchKey::new("ns", "idx", "ab");
        let b = SearchKey::new("ns", "idxa", "b");
        assert_ne!(a.field_meta(), b.field_meta());
        assert!(!a.node(0, "k").starts_with(&b.level_prefix(0)));
    }

    #[test]
    fn test_node_key_prefix_free() {
        // "n1" must not be a prefix match for "n10" on the same level
        let sk = sk();
        assert!(!sk.node(0, "n10").starts_with(&sk.node(0, "n1")));
    }

    #[test]
    fn test_decode_node_key_rejects_garbage() {
        let sk = sk();
        assert!(sk.decode_node_key(0, b"garbage").is_err());

        let mut truncated = sk.node(0, "node");
        truncated.pop();
        assert!(sk.decode_node_key(0, &truncated).is_err());
    }

    #[test]
    fn test_sized_string_roundtrip() {
        let mut buf = Vec::new();
        put_sized(&mut buf, "héllo".as_bytes());
        let mut slice = buf.as_slice();
        assert_eq!(get_sized_string(&mut slice).unwrap(), "héllo");
        assert!(slice.is_empty());
    }
}
