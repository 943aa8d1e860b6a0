//! Range scan executor.
//!
//! ```text
//! Pending ──first pull──► Open { rows, cursor } ──cutoff / no growth──► Done
//!                            │    ▲
//!                            └────┘ rows exhausted: expand_search_scope
//! ```

use crate::{ExecutorNode, HnswError, HnswRangeScan, Result, ScanState, SearchRow};
use nori_hnsw::HnswIndex;
use nori_kv::KvEngine;
use nori_vector::VectorMatch;
use std::collections::HashSet;

/// Streams the neighbours of the scan vector whose distance is within
/// `range * (1 + epsilon)`.
///
/// The scan is seeded with a KNN search of width `ef_runtime`; when the
/// seed rows are used up it grows one hop at a time over layer 0. Rows come
/// out in non-decreasing distance within each hop, and the scan stops at the
/// first row beyond the cutoff. Every key is emitted at most once.
pub struct HnswRangeScanExecutor<'a, E: KvEngine + 'a> {
    scan: HnswRangeScan,
    state: ScanState<E::Snapshot<'a>>,
    rows: Vec<VectorMatch>,
    cursor: usize,
    visited: HashSet<String>,
}

impl<'a, E: KvEngine + 'a> HnswRangeScanExecutor<'a, E> {
    /// Returns [`HnswError::InvalidArgument`] for a negative or NaN range.
    pub fn new(engine: &'a E, scan: HnswRangeScan) -> Result<Self> {
        if scan.range.is_nan() || scan.range < 0.0 {
            return Err(HnswError::InvalidArgument(format!(
                "range must be a non-negative number, got {}",
                scan.range
            )));
        }
        Ok(Self {
            scan,
            state: ScanState::Pending(engine.snapshot()),
            rows: Vec::new(),
            cursor: 0,
            visited: HashSet::new(),
        })
    }

    fn initialize(&mut self) -> Result<()> {
        let snapshot = match std::mem::replace(&mut self.state, ScanState::Done) {
            ScanState::Pending(snapshot) => snapshot,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        let index = HnswIndex::open(self.scan.field.clone(), snapshot)?;
        if index.metadata.is_empty() {
            tracing::trace!("Range scan on empty field {}", self.scan.field.field);
            return Ok(());
        }

        let seed_width = index.metadata.ef_runtime as usize;
        self.rows = index.knn_search(&self.scan.vector, seed_width)?;
        self.cursor = 0;
        tracing::debug!(
            "Range scan on {} seeded with {} rows",
            self.scan.field.field,
            self.rows.len()
        );
        self.state = ScanState::Open(index);
        Ok(())
    }
}

impl<'a, E: KvEngine + 'a> ExecutorNode for HnswRangeScanExecutor<'a, E> {
    fn next(&mut self) -> Result<Option<SearchRow>> {
        self.initialize()?;
        let index = match &self.state {
            ScanState::Open(index) => index,
            _ => return Ok(None),
        };
        let cutoff = self.scan.range * (1.0 + index.metadata.epsilon);

        if self.cursor >= self.rows.len() {
            let expanded =
                index.expand_search_scope(&self.scan.vector, &self.rows, &mut self.visited)?;
            tracing::trace!("Range scan expanded by {} rows", expanded.len());
            if expanded.is_empty() {
                self.state = ScanState::Done;
                return Ok(None);
            }
            self.rows = expanded;
            self.cursor = 0;
        }

        let row = &self.rows[self.cursor];
        if row.distance > cutoff {
            self.state = ScanState::Done;
            return Ok(None);
        }

        self.cursor += 1;
        self.visited.insert(row.key.clone());
        Ok(Some(SearchRow {
            key: row.key.clone(),
            score: row.distance,
            field: self.scan.field.field.clone(),
        }))
    }
}
