//! KNN scan executor.

use crate::{ExecutorNode, HnswKnnScan, Result, ScanState, SearchRow};
use nori_hnsw::HnswIndex;
use nori_kv::KvEngine;
use nori_vector::VectorMatch;

/// Streams the `k` nearest neighbours of the scan vector, closest first.
///
/// The search itself runs once, on the first pull, against the snapshot
/// taken by [`new`](Self::new). An empty graph yields an empty stream.
pub struct HnswKnnScanExecutor<'a, E: KvEngine + 'a> {
    scan: HnswKnnScan,
    state: ScanState<E::Snapshot<'a>>,
    rows: std::vec::IntoIter<VectorMatch>,
}

impl<'a, E: KvEngine + 'a> HnswKnnScanExecutor<'a, E> {
    pub fn new(engine: &'a E, scan: HnswKnnScan) -> Self {
        Self {
            scan,
            state: ScanState::Pending(engine.snapshot()),
            rows: Vec::new().into_iter(),
        }
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
            tracing::trace!("KNN scan on empty field {}", self.scan.field.field);
            return Ok(());
        }

        let matches = index.knn_search(&self.scan.vector, self.scan.k)?;
        tracing::debug!(
            "KNN scan on {} found {} of {} requested rows",
            self.scan.field.field,
            matches.len(),
            self.scan.k
        );
        self.rows = matches.into_iter();
        self.state = ScanState::Open(index);
        Ok(())
    }
}

impl<'a, E: KvEngine + 'a> ExecutorNode for HnswKnnScanExecutor<'a, E> {
    fn next(&mut self) -> Result<Option<SearchRow>> {
        self.initialize()?;
        if let ScanState::Done = self.state {
            return Ok(None);
        }

        match self.rows.next() {
            Some(m) => Ok(Some(SearchRow {
                key: m.key,
                score: m.distance,
                field: self.scan.field.field.clone(),
            })),
            None => {
                self.state = ScanState::Done;
                Ok(None)
            }
        }
    }
}
