//! Pull-based vector scan executors for NoriKV search plans.
//!
//! Each executor answers one plan node against the HNSW index of a vector
//! field:
//!
//! - [`HnswKnnScanExecutor`]: the `k` nearest neighbours of a query vector
//! - [`HnswRangeScanExecutor`]: every neighbour within a radius, found by
//!   widening the search one graph hop at a time
//!
//! An executor opens a storage snapshot when it is built and reads nothing
//! until the first [`ExecutorNode::next`] call. Rows are produced lazily and
//! the end of the stream is sticky.
//!
//! # Example
//!
//! ```
//! use nori_hnsw::{create_field, HnswConfig, HnswIndex, HnswVectorFieldMetadata, SearchKey};
//! use nori_kv::{KvEngine, MemKv, WriteBatch};
//! use nori_search::{ExecutorNode, HnswKnnScan, HnswKnnScanExecutor};
//! use nori_vector::{DistanceMetric, VectorType};
//!
//! let kv = MemKv::new();
//! let field = SearchKey::new("ns", "idx", "embedding");
//! let meta = HnswVectorFieldMetadata::new(2, DistanceMetric::L2, VectorType::Float64, &HnswConfig::default());
//!
//! let mut batch = WriteBatch::new();
//! create_field(&field, &meta, &mut batch).unwrap();
//! let mut index = HnswIndex::new(field.clone(), meta, &kv).unwrap();
//! index.insert_vector_entry("near", &[0.0, 1.0], &mut batch).unwrap();
//! index.insert_vector_entry("far", &[5.0, 5.0], &mut batch).unwrap();
//! kv.write(batch).unwrap();
//!
//! let scan = HnswKnnScan { field, vector: vec![0.0, 0.0], k: 1 };
//! let mut executor = HnswKnnScanExecutor::new(&kv, scan);
//! let row = executor.next().unwrap().unwrap();
//! assert_eq!(row.key, "near");
//! assert!(executor.next().unwrap().is_none());
//! ```

mod knn_scan;
mod range_scan;

pub use knn_scan::HnswKnnScanExecutor;
pub use nori_hnsw::{HnswError, Result};
pub use range_scan::HnswRangeScanExecutor;

use nori_hnsw::{HnswIndex, SearchKey};

/// One result row: the matching record key and its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    pub key: String,
    /// Distance to the query; lower = more similar
    pub score: f64,
    /// Name of the vector field that produced the row
    pub field: String,
}

/// A pull-based plan executor.
pub trait ExecutorNode {
    /// Produce the next row, or `None` at the end of the stream.
    ///
    /// Once `None` has been returned every later call returns `None`.
    fn next(&mut self) -> Result<Option<SearchRow>>;

    /// Drain the executor.
    fn collect_rows(&mut self) -> Result<Vec<SearchRow>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Plan node: `k` nearest neighbours of `vector` in `field`.
#[derive(Debug, Clone)]
pub struct HnswKnnScan {
    pub field: SearchKey,
    pub vector: Vec<f64>,
    pub k: usize,
}

/// Plan node: neighbours of `vector` in `field` within `range`.
#[derive(Debug, Clone)]
pub struct HnswRangeScan {
    pub field: SearchKey,
    pub vector: Vec<f64>,
    pub range: f64,
}

/// Lifecycle shared by both executors.
enum ScanState<S> {
    /// Snapshot taken, nothing read yet
    Pending(S),
    /// Field metadata loaded
    Open(HnswIndex<S>),
    /// End of stream
    Done,
}
