//! Vector items and distance metrics for NoriKV.
//!
//! This crate holds the pure, storage-free part of vector search:
//!
//! - **Distance metrics**: L2, inner product, cosine ([`DistanceMetric`])
//! - **VectorItem**: a key plus coordinates, validated against a field dimension
//! - **VectorMatch**: a scored search result, ordered by distance then key
//!
//! # Architecture
//!
//! ```text
//! nori-search:  KNN / range scan executors
//!      ↓
//! nori-hnsw:    HNSW graph persisted in nori-kv
//!      ↓
//! nori-vector:  VectorItem + DistanceMetric   <-- This crate
//! ```
//!
//! # Example
//!
//! ```
//! use nori_vector::{compute_similarity, DistanceMetric, VectorItem};
//!
//! let a = VectorItem::new("a", vec![0.0, 0.0, 0.0], 3).unwrap();
//! let b = VectorItem::new("b", vec![3.0, 4.0, 0.0], 3).unwrap();
//!
//! let d = compute_similarity(&a, &b, DistanceMetric::L2).unwrap();
//! assert!((d - 5.0).abs() < 1e-9);
//! ```

mod distance;
mod item;

pub use distance::{
    cosine_distance, euclidean_distance, euclidean_distance_squared, inner_product, DistanceMetric,
};
pub use item::{compute_similarity, VectorItem, VectorMatch, VectorType};

/// Error type for vector operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),
}

/// Result type for vector operations.
pub type Result<T> = std::result::Result<T, VectorError>;
