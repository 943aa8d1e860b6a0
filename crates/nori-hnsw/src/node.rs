//! Node records of the persisted HNSW graph.
//!
//! A node present on layer L owns one layer record under
//! [`SearchKey::node`]. The record carries the neighbour count and the
//! neighbour keys together, so the stored count can never drift from the
//! stored set:
//!
//! ```text
//! [version: u8 = 1] [num_neighbours: u16 BE] [neighbour key]*   (length-prefixed)
//! ```
//!
//! The coordinates are stored once per node, independent of layer:
//!
//! ```text
//! [vector_type: u8] [dim: u16 BE] [coordinate: f32/f64 LE]*
//! ```
//!
//! Every mutating method stages into a caller-supplied [`WriteBatch`] and
//! reads through [`WriteBatch::overlay`], so a sequence of edits within one
//! batch composes.

use crate::keys::{get_sized_string, put_sized, SearchKey};
use crate::{HnswError, Result};
use bytes::{Buf, BufMut, BytesMut};
use nori_kv::{KvRead, WriteBatch};
use nori_vector::VectorType;
use std::collections::BTreeSet;

const NODE_RECORD_VERSION: u8 = 1;

/// Decoded header of a layer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswNodeFieldMetadata {
    pub num_neighbours: u16,
}

/// Neighbour set of a node on one layer, kept in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbours {
    keys: BTreeSet<String>,
}

impl Neighbours {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a neighbour.
    /// Returns true if added, false if already present.
    pub fn add(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    /// Remove a neighbour.
    /// Returns true if removed, false if not found.
    pub fn remove(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.keys.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}

impl FromIterator<String> for Neighbours {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// One node on one layer.
///
/// `neighbours` is an in-memory copy; it is filled by
/// [`decode_neighbours`](Self::decode_neighbours) and kept in sync by the
/// mutating methods.
#[derive(Debug, Clone)]
pub struct HnswNode {
    pub key: String,
    pub level: u16,
    pub neighbours: Neighbours,
}

impl HnswNode {
    pub fn new(key: impl Into<String>, level: u16) -> Self {
        Self {
            key: key.into(),
            level,
            neighbours: Neighbours::new(),
        }
    }

    fn read_record<R: KvRead>(&self, search_key: &SearchKey, db: &R) -> Result<bytes::Bytes> {
        db.get(&search_key.node(self.level, &self.key))?
            .ok_or_else(|| {
                HnswError::NotFound(format!("node {} on level {}", self.key, self.level))
            })
    }

    /// Decode the header of this node's layer record.
    ///
    /// Returns [`HnswError::NotFound`] if the node is not on this layer.
    pub fn decode_metadata<R: KvRead>(
        &self,
        search_key: &SearchKey,
        db: &R,
    ) -> Result<HnswNodeFieldMetadata> {
        let record = self.read_record(search_key, db)?;
        let mut buf = record.as_ref();
        decode_header(&mut buf)
    }

    /// Load the neighbour set from storage into `self.neighbours`.
    pub fn decode_neighbours<R: KvRead>(&mut self, search_key: &SearchKey, db: &R) -> Result<()> {
        let record = self.read_record(search_key, db)?;
        let mut buf = record.as_ref();
        let header = decode_header(&mut buf)?;

        let mut neighbours = Neighbours::new();
        for _ in 0..header.num_neighbours {
            neighbours.add(get_sized_string(&mut buf)?);
        }
        if neighbours.len() != header.num_neighbours as usize || buf.has_remaining() {
            return Err(HnswError::Corruption(format!(
                "neighbour list of {} on level {} disagrees with its count",
                self.key, self.level
            )));
        }

        self.neighbours = neighbours;
        Ok(())
    }

    /// Stage this node's layer record with the current in-memory neighbours.
    pub fn put_metadata(&self, search_key: &SearchKey, batch: &mut WriteBatch) {
        let mut buf = BytesMut::with_capacity(3 + self.neighbours.len() * 16);
        buf.put_u8(NODE_RECORD_VERSION);
        buf.put_u16(self.neighbours.len() as u16);
        for key in self.neighbours.iter() {
            put_sized(&mut buf, key.as_bytes());
        }
        batch.put(search_key.node(self.level, &self.key), buf.freeze());
    }

    /// Add `neighbour` to this node's record (one direction only).
    ///
    /// Re-reads the record through the batch first, so earlier staged edits
    /// are preserved. Adding an existing neighbour leaves the set unchanged.
    pub fn add_neighbour<R: KvRead>(
        &mut self,
        neighbour: &str,
        search_key: &SearchKey,
        db: &R,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        self.decode_neighbours(search_key, &batch.overlay(db))?;
        self.neighbours.add(neighbour);
        self.put_metadata(search_key, batch);
        Ok(())
    }

    /// Remove `neighbour` from this node's record (one direction only).
    pub fn remove_neighbour<R: KvRead>(
        &mut self,
        neighbour: &str,
        search_key: &SearchKey,
        db: &R,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        self.decode_neighbours(search_key, &batch.overlay(db))?;
        if self.neighbours.remove(neighbour) {
            self.put_metadata(search_key, batch);
        }
        Ok(())
    }

    /// Stage removal of this node's layer record.
    pub fn remove(&self, search_key: &SearchKey, batch: &mut WriteBatch) {
        batch.delete(search_key.node(self.level, &self.key));
    }

    /// Stage the node's vector record.
    pub fn put_vector(
        &self,
        vector: &[f64],
        vector_type: VectorType,
        search_key: &SearchKey,
        batch: &mut WriteBatch,
    ) {
        let mut buf = BytesMut::with_capacity(3 + vector.len() * vector_type.element_size());
        buf.put_u8(vector_type.as_u8());
        buf.put_u16(vector.len() as u16);
        for &v in vector {
            match vector_type {
                VectorType::Float32 => buf.put_f32_le(v as f32),
                VectorType::Float64 => buf.put_f64_le(v),
            }
        }
        batch.put(search_key.vector(&self.key), buf.freeze());
    }

    /// Decode the node's vector record.
    pub fn decode_vector<R: KvRead>(&self, search_key: &SearchKey, db: &R) -> Result<Vec<f64>> {
        let record = db
            .get(&search_key.vector(&self.key))?
            .ok_or_else(|| HnswError::NotFound(format!("vector of node {}", self.key)))?;
        decode_vector_record(&record)
    }

    /// Stage removal of the node's vector record.
    pub fn remove_vector(&self, search_key: &SearchKey, batch: &mut WriteBatch) {
        batch.delete(search_key.vector(&self.key));
    }
}

fn decode_header(buf: &mut &[u8]) -> Result<HnswNodeFieldMetadata> {
    if buf.remaining() < 3 {
        return Err(HnswError::Corruption("truncated node record".to_string()));
    }
    let version = buf.get_u8();
    if version != NODE_RECORD_VERSION {
        return Err(HnswError::Corruption(format!(
            "unsupported node record version: {}",
            version
        )));
    }
    Ok(HnswNodeFieldMetadata {
        num_neighbours: buf.get_u16(),
    })
}

fn decode_vector_record(mut buf: &[u8]) -> Result<Vec<f64>> {
    if buf.remaining() < 3 {
        return Err(HnswError::Corruption("truncated vector record".to_string()));
    }
    let tag = buf.get_u8();
    let vector_type = VectorType::from_u8(tag)
        .ok_or_else(|| HnswError::Corruption(format!("unknown vector type: {}", tag)))?;
    let dim = buf.get_u16() as usize;
    if buf.remaining() != dim * vector_type.element_size() {
        return Err(HnswError::Corruption(format!(
            "vector record holds {} bytes for {} coordinates",
            buf.remaining(),
            dim
        )));
    }

    let vector = (0..dim)
        .map(|_| match vector_type {
            VectorType::Float32 => buf.get_f32_le() as f64,
            VectorType::Float64 => buf.get_f64_le(),
        })
        .collect();
    Ok(vector)
}
