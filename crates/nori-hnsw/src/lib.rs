//! HNSW (Hierarchical Navigable Small World) vector index for NoriKV.
//!
//! The graph lives entirely in the key-value store: one record per node per
//! layer (its neighbour list), one vector record per node, and one metadata
//! record per vector field. Nothing is cached between calls, so any reader
//! holding a snapshot sees a consistent graph.
//!
//! - Higher layers hold fewer nodes (exponential decay with base `m`)
//! - Each layer is a navigable small-world graph with symmetric edges
//! - Search starts at the entry point on the top layer and descends
//!
//! # Architecture
//!
//! ```text
//! nori-search:  KNN / range scan executors (snapshot readers)
//!      ↓
//! nori-hnsw:    HnswIndex over KvRead               <-- This crate
//!      ↓
//! nori-kv:      get / scan_prefix / WriteBatch / snapshots
//! ```
//!
//! Mutations never write directly. They stage every record they touch into
//! the caller's [`WriteBatch`](nori_kv::WriteBatch) and read through it, so the
//! whole insert or delete commits atomically with one `KvEngine::write`.
//!
//! # Parameters
//!
//! - `m`: level decay base (default: 16)
//! - `max_m` / `max_m0`: neighbour caps above / on layer 0 (default: M / 2*M)
//! - `ef_construction`: beam width while inserting (default: 200)
//! - `ef_runtime`: beam width while searching (default: 10)
//! - `epsilon`: range query slack (default: 0.01)
//!
//! # Example
//!
//! ```
//! use nori_hnsw::{create_field, HnswConfig, HnswIndex, HnswVectorFieldMetadata, SearchKey};
//! use nori_kv::{KvEngine, MemKv, WriteBatch};
//! use nori_vector::{DistanceMetric, VectorType};
//!
//! let kv = MemKv::new();
//! let sk = SearchKey::new("ns", "idx", "embedding");
//! let meta = HnswVectorFieldMetadata::new(3, DistanceMetric::L2, VectorType::Float64, &HnswConfig::default());
//!
//! let mut batch = WriteBatch::new();
//! create_field(&sk, &meta, &mut batch).unwrap();
//! kv.write(batch).unwrap();
//!
//! let mut index = HnswIndex::open(sk.clone(), &kv).unwrap();
//! let mut batch = WriteBatch::new();
//! index.insert_vector_entry("a", &[1.0, 2.0, 3.0], &mut batch).unwrap();
//! index.insert_vector_entry("b", &[9.0, 9.0, 9.0], &mut batch).unwrap();
//! kv.write(batch).unwrap();
//!
//! let index = HnswIndex::open(sk, kv.snapshot()).unwrap();
//! let results = index.knn_search(&[1.0, 2.0, 2.5], 1).unwrap();
//! assert_eq!(results[0].key, "a");
//! ```

mod index;
mod keys;
mod layer;
mod metadata;
mod node;

pub use index::{create_field, HnswIndex};
pub use keys::SearchKey;
pub use layer::{random_layer, random_layer_with, MAX_LEVEL};
pub use metadata::{HnswConfig, HnswVectorFieldMetadata};
pub use node::{HnswNode, HnswNodeFieldMetadata, Neighbours};

/// Error type for HNSW operations.
#[derive(Debug, thiserror::Error)]
pub enum HnswError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Vector error: {0}")]
    Vector(#[from] nori_vector::VectorError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[from] nori_kv::KvError),

    #[error("Corrupt record: {0}")]
    Corruption(String),
}

impl HnswError {
    /// True for the expected "nothing there" outcome (empty graph, missing
    /// node or field), as opposed to a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for HNSW operations.
pub type Result<T> = std::result::Result<T, HnswError>;
