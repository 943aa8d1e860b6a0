//! HNSW index over a key-value store.
//!
//! Implements the Hierarchical Navigable Small World algorithm for
//! approximate nearest neighbor search, with every node, edge and vector
//! kept as records in a [`KvRead`] store.

use crate::keys::SearchKey;
use crate::layer::random_layer;
use crate::metadata::HnswVectorFieldMetadata;
use crate::node::HnswNode;
use crate::{HnswError, Result};
use nori_kv::{KvRead, WriteBatch};
use nori_vector::{compute_similarity, VectorItem, VectorMatch};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Candidate during search (item, distance to the query).
#[derive(Debug, Clone)]
struct Candidate {
    item: VectorItem,
    distance: f64,
}

impl Candidate {
    fn to_match(&self) -> VectorMatch {
        VectorMatch::new(self.item.key.clone(), self.distance)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.item.key.cmp(&other.item.key))
    }
}

/// Validate `metadata` and stage it as the field metadata record of a new,
/// empty vector field.
pub fn create_field(
    search_key: &SearchKey,
    metadata: &HnswVectorFieldMetadata,
    batch: &mut WriteBatch,
) -> Result<()> {
    metadata.validate()?;
    if metadata.num_levels != 0 || metadata.entry_point.is_some() {
        return Err(HnswError::InvalidArgument(
            "a new vector field must start with an empty graph".to_string(),
        ));
    }
    metadata.put(search_key, batch);
    tracing::debug!(
        "Created vector field {}/{}/{} (dim={}, metric={:?})",
        search_key.ns,
        search_key.index,
        search_key.field,
        metadata.dim,
        metadata.distance_metric
    );
    Ok(())
}

/// HNSW index handle.
///
/// Holds the field's key, a copy of its metadata and the store it reads.
/// Searches read `store` only; pass a snapshot for repeatable reads.
/// Mutations read `store` through the caller's batch and stage every write
/// into it. Each mutation first reloads the field metadata the same way, so
/// a handle opened before other commits still extends the latest graph.
pub struct HnswIndex<S> {
    pub search_key: SearchKey,
    pub metadata: HnswVectorFieldMetadata,
    store: S,
}

impl<S> std::fmt::Debug for HnswIndex<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("search_key", &self.search_key)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl<S: KvRead> HnswIndex<S> {
    /// Create a handle from already loaded metadata.
    pub fn new(search_key: SearchKey, metadata: HnswVectorFieldMetadata, store: S) -> Result<Self> {
        metadata.validate()?;
        Ok(Self {
            search_key,
            metadata,
            store,
        })
    }

    /// Create a handle by loading the field metadata from `store`.
    ///
    /// Returns [`HnswError::NotFound`] if the field was never created.
    pub fn open(search_key: SearchKey, store: S) -> Result<Self> {
        let metadata = HnswVectorFieldMetadata::load(&search_key, &store)?;
        Self::new(search_key, metadata, store)
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Draw the top level for a new node.
    pub fn randomize_layer(&self) -> u16 {
        random_layer(self.metadata.m)
    }

    /// The entry point, if it is present on `level`.
    pub fn default_entry_point(&self, level: u16) -> Result<String> {
        self.default_entry_point_in(&self.store, level)
    }

    fn default_entry_point_in<R: KvRead>(&self, reader: &R, level: u16) -> Result<String> {
        let entry_point = self
            .metadata
            .entry_point
            .as_ref()
            .ok_or_else(|| HnswError::NotFound("graph has no entry point".to_string()))?;
        HnswNode::new(entry_point.as_str(), level).decode_metadata(&self.search_key, reader)?;
        Ok(entry_point.clone())
    }

    fn make_item(&self, key: impl Into<String>, vector: &[f64]) -> Result<VectorItem> {
        Ok(VectorItem::new(key, vector.to_vec(), self.metadata.dim as usize)?)
    }

    fn distance(&self, a: &VectorItem, b: &VectorItem) -> Result<f64> {
        Ok(compute_similarity(a, b, self.metadata.distance_metric)?)
    }

    /// Load a node's vector without checking which layers it is on.
    fn load_item<R: KvRead>(&self, reader: &R, key: &str) -> Result<VectorItem> {
        let vector = HnswNode::new(key, 0).decode_vector(&self.search_key, reader)?;
        self.make_item(key, &vector)
    }

    /// Load the vectors of nodes present on `level`, in input order.
    ///
    /// Returns [`HnswError::NotFound`] if any node is not on `level`.
    pub fn decode_nodes_to_vector_items(
        &self,
        keys: &[String],
        level: u16,
    ) -> Result<Vec<VectorItem>> {
        self.decode_nodes_to_vector_items_in(&self.store, keys, level)
    }

    fn decode_nodes_to_vector_items_in<R: KvRead>(
        &self,
        reader: &R,
        keys: &[String],
        level: u16,
    ) -> Result<Vec<VectorItem>> {
        keys.iter()
            .map(|key| {
                HnswNode::new(key.as_str(), level).decode_metadata(&self.search_key, reader)?;
                self.load_item(reader, key)
            })
            .collect()
    }

    /// All node keys on `level`, in key order.
    pub fn nodes_at_level(&self, level: u16) -> Result<Vec<String>> {
        self.nodes_at_level_in(&self.store, level)
    }

    fn nodes_at_level_in<R: KvRead>(&self, reader: &R, level: u16) -> Result<Vec<String>> {
        let mut keys = reader
            .scan_prefix(&self.search_key.level_prefix(level))?
            .iter()
            .map(|(key, _)| self.search_key.decode_node_key(level, key))
            .collect::<Result<Vec<_>>>()?;
        // Length-prefixed keys scan shortest first
        keys.sort_unstable();
        Ok(keys)
    }

    /// Replace the cached metadata with the record `batch` would commit on
    /// top of the store.
    fn reload_metadata(&mut self, batch: &WriteBatch) -> Result<()> {
        let metadata =
            HnswVectorFieldMetadata::load(&self.search_key, &batch.overlay(&self.store))?;
        self.metadata = metadata;
        Ok(())
    }

    /// Keep the closest `candidates` to `vec`, up to the neighbour cap of
    /// `level`, ordered by (distance, key).
    pub fn select_neighbors(
        &self,
        vec: &VectorItem,
        candidates: &[VectorItem],
        level: u16,
    ) -> Result<Vec<VectorItem>> {
        let mut scored = candidates
            .iter()
            .map(|item| {
                Ok(Candidate {
                    distance: self.distance(vec, item)?,
                    item: item.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        scored.sort();
        scored.truncate(self.metadata.capacity(level));
        Ok(scored.into_iter().map(|c| c.item).collect())
    }

    /// Search a single layer for the `ef` nodes closest to `target`.
    ///
    /// Returns items sorted by (distance, key), closest first.
    pub fn search_layer(
        &self,
        level: u16,
        target: &VectorItem,
        ef: usize,
        entry_points: &[String],
    ) -> Result<Vec<VectorItem>> {
        let candidates = self.search_layer_in(&self.store, level, target, ef, entry_points)?;
        Ok(candidates.into_iter().map(|c| c.item).collect())
    }

    fn search_layer_in<R: KvRead>(
        &self,
        reader: &R,
        level: u16,
        target: &VectorItem,
        ef: usize,
        entry_points: &[String],
    ) -> Result<Vec<Candidate>> {
        if ef == 0 {
            return Err(HnswError::InvalidArgument("ef must be positive".to_string()));
        }

        // Min-heap for candidates (closest first)
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        // Max-heap for results (furthest first, for pruning)
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut visited: HashSet<String> = HashSet::new();

        // Initialize with entry points
        for item in self.decode_nodes_to_vector_items_in(reader, entry_points, level)? {
            if !visited.insert(item.key.clone()) {
                continue;
            }
            let candidate = Candidate {
                distance: self.distance(target, &item)?,
                item,
            };
            candidates.push(Reverse(candidate.clone()));
            results.push(candidate);
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = candidates.pop() {
            // Stop if current is worse than worst in results (and results is full)
            if results.len() >= ef {
                if let Some(worst) = results.peek() {
                    if current.distance > worst.distance {
                        break;
                    }
                }
            }

            let mut node = HnswNode::new(current.item.key.as_str(), level);
            node.decode_neighbours(&self.search_key, reader)?;

            for neighbour_key in node.neighbours.iter() {
                if !visited.insert(neighbour_key.clone()) {
                    continue;
                }

                let item = self.load_item(reader, neighbour_key)?;
                let neighbour = Candidate {
                    distance: self.distance(target, &item)?,
                    item,
                };

                // Add to candidates if better than worst result
                let should_add = results.len() < ef
                    || results.peek().map(|w| neighbour < *w).unwrap_or(true);

                if should_add {
                    candidates.push(Reverse(neighbour.clone()));
                    results.push(neighbour);

                    // Prune results if over ef
                    while results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        tracing::trace!(
            "search_layer level={} ef={} visited={} kept={}",
            level,
            ef,
            visited.len(),
            results.len()
        );

        Ok(results.into_sorted_vec())
    }

    /// Find the `k` nodes closest to `query`.
    ///
    /// Returns [`HnswError::NotFound`] on an empty graph. Fewer than `k`
    /// results means the graph holds fewer than `k` reachable nodes.
    pub fn knn_search(&self, query: &[f64], k: usize) -> Result<Vec<VectorMatch>> {
        let target = self.make_item("", query)?;
        let entry_point = self.default_entry_point(self.metadata.num_levels.saturating_sub(1))?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut entry_points = vec![entry_point];

        // Search from top layer down to layer 1
        for level in (1..self.metadata.num_levels).rev() {
            let nearest = self.search_layer_in(&self.store, level, &target, 1, &entry_points)?;
            if let Some(closest) = nearest.into_iter().next() {
                entry_points = vec![closest.item.key];
            }
        }

        // Search layer 0 with ef_runtime, widened to k
        let ef = (self.metadata.ef_runtime as usize).max(k);
        let candidates = self.search_layer_in(&self.store, 0, &target, ef, &entry_points)?;

        Ok(candidates.iter().take(k).map(Candidate::to_match).collect())
    }

    /// Grow a search past `current` by one hop on layer 0.
    ///
    /// Every layer-0 neighbour of a node in `current` that is not yet in
    /// `visited` is scored and added to `visited`. The new matches are
    /// returned sorted by (distance, key); an empty result means the scope
    /// cannot grow any further.
    pub fn expand_search_scope(
        &self,
        query: &[f64],
        current: &[VectorMatch],
        visited: &mut HashSet<String>,
    ) -> Result<Vec<VectorMatch>> {
        let target = self.make_item("", query)?;
        let mut expanded = Vec::new();

        for m in current {
            let mut node = HnswNode::new(m.key.as_str(), 0);
            node.decode_neighbours(&self.search_key, &self.store)?;

            for neighbour_key in node.neighbours.iter() {
                if !visited.insert(neighbour_key.clone()) {
                    continue;
                }
                let item = self.load_item(&self.store, neighbour_key)?;
                expanded.push(VectorMatch::new(
                    neighbour_key.clone(),
                    self.distance(&target, &item)?,
                ));
            }
        }

        expanded.sort();
        tracing::trace!(
            "Expanded search scope from {} to {} new nodes",
            current.len(),
            expanded.len()
        );
        Ok(expanded)
    }

    /// Insert `key` on a level drawn by [`randomize_layer`](Self::randomize_layer).
    pub fn insert_vector_entry(
        &mut self,
        key: &str,
        vector: &[f64],
        batch: &mut WriteBatch,
    ) -> Result<()> {
        let target_level = self.randomize_layer();
        self.insert_vector_entry_internal(key, vector, batch, target_level)
    }

    /// Insert `key` on layers `0..=target_level`.
    ///
    /// All writes are staged into `batch` and every read goes through it, so
    /// several mutations can share one batch. On error the batch may hold a
    /// partial insert and must be discarded.
    ///
    /// Nothing is locked between the reads and the commit of `batch`. Two
    /// inserts built against the same committed state can both commit, and
    /// the later metadata and neighbour records win; callers that need a
    /// consistent graph must serialize their mutation batches per field.
    ///
    /// Returns [`HnswError::NotFound`] if the field was never created.
    pub fn insert_vector_entry_internal(
        &mut self,
        key: &str,
        vector: &[f64],
        batch: &mut WriteBatch,
        target_level: u16,
    ) -> Result<()> {
        self.reload_metadata(batch)?;
        let inserted = self.make_item(key, vector)?;
        let search_key = self.search_key.clone();

        match HnswNode::new(key, 0).decode_metadata(&search_key, &batch.overlay(&self.store)) {
            Ok(_) => {
                return Err(HnswError::InvalidArgument(format!(
                    "key {} is already indexed",
                    key
                )))
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        HnswNode::new(key, 0).put_vector(vector, self.metadata.vector_type, &search_key, batch);

        let entry_point = match self.metadata.entry_point.clone() {
            Some(entry_point) if self.metadata.num_levels > 0 => entry_point,
            _ => {
                // First node: sole occupant of every layer it spans
                for level in 0..=target_level {
                    HnswNode::new(key, level).put_metadata(&search_key, batch);
                }
                self.metadata.entry_point = Some(key.to_string());
                self.metadata.num_levels = target_level + 1;
                self.metadata.put(&search_key, batch);
                tracing::debug!(
                    "Inserted first node {} (num_levels={})",
                    key,
                    self.metadata.num_levels
                );
                return Ok(());
            }
        };

        let top_level = self.metadata.num_levels - 1;
        let mut entry_points = vec![entry_point];

        // Greedy descent down to target_level + 1
        for level in (target_level.saturating_add(1)..=top_level).rev() {
            let nearest = self.search_layer_in(
                &batch.overlay(&self.store),
                level,
                &inserted,
                1,
                &entry_points,
            )?;
            if let Some(closest) = nearest.into_iter().next() {
                entry_points = vec![closest.item.key];
            }
        }

        // Link into each layer from min(target_level, top_level) down to 0
        for level in (0..=target_level.min(top_level)).rev() {
            let candidates = self.search_layer_in(
                &batch.overlay(&self.store),
                level,
                &inserted,
                self.metadata.ef_construction as usize,
                &entry_points,
            )?;
            let candidate_items: Vec<VectorItem> =
                candidates.iter().map(|c| c.item.clone()).collect();
            let selected = self.select_neighbors(&inserted, &candidate_items, level)?;

            HnswNode::new(key, level).put_metadata(&search_key, batch);
            for neighbour in &selected {
                self.connect(&inserted, neighbour, level, batch)?;
            }

            entry_points = candidates.into_iter().map(|c| c.item.key).collect();
        }

        if target_level > top_level {
            for level in top_level + 1..=target_level {
                HnswNode::new(key, level).put_metadata(&search_key, batch);
            }
            self.metadata.entry_point = Some(key.to_string());
            self.metadata.num_levels = target_level + 1;
            tracing::debug!(
                "Node {} is the new entry point (num_levels={})",
                key,
                self.metadata.num_levels
            );
        }

        self.metadata.put(&search_key, batch);
        Ok(())
    }

    /// Create the edge `inserted <-> neighbour` on `level`.
    ///
    /// A neighbour already at capacity re-selects among its current
    /// neighbours plus `inserted`. If `inserted` is not kept, no edge is
    /// made; otherwise the edges to the dropped neighbours are removed on
    /// both sides.
    fn connect(
        &self,
        inserted: &VectorItem,
        neighbour: &VectorItem,
        level: u16,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        let search_key = &self.search_key;
        let mut neighbour_node = HnswNode::new(neighbour.key.as_str(), level);
        neighbour_node.decode_neighbours(search_key, &batch.overlay(&self.store))?;

        if neighbour_node.neighbours.len() + 1 > self.metadata.capacity(level) {
            let current = neighbour_node.neighbours.to_vec();
            let mut pool =
                self.decode_nodes_to_vector_items_in(&batch.overlay(&self.store), &current, level)?;
            pool.push(inserted.clone());

            let kept = self.select_neighbors(neighbour, &pool, level)?;
            if !kept.iter().any(|item| item.key == inserted.key) {
                tracing::trace!(
                    "Level {}: {} is full and keeps its neighbours over {}",
                    level,
                    neighbour.key,
                    inserted.key
                );
                return Ok(());
            }

            for dropped in current
                .iter()
                .filter(|key| !kept.iter().any(|item| &item.key == *key))
            {
                neighbour_node.remove_neighbour(dropped, search_key, &self.store, batch)?;
                HnswNode::new(dropped.as_str(), level).remove_neighbour(
                    &neighbour.key,
                    search_key,
                    &self.store,
                    batch,
                )?;
                tracing::trace!("Level {}: pruned edge {} <-> {}", level, neighbour.key, dropped);
            }
        }

        neighbour_node.add_neighbour(&inserted.key, search_key, &self.store, batch)?;
        HnswNode::new(inserted.key.as_str(), level).add_neighbour(
            &neighbour.key,
            search_key,
            &self.store,
            batch,
        )?;
        tracing::trace!("Level {}: linked {} <-> {}", level, inserted.key, neighbour.key);
        Ok(())
    }

    /// Remove `key` and every edge pointing at it.
    ///
    /// Returns [`HnswError::NotFound`] if the field was never created or
    /// `key` is not indexed.
    pub fn delete_vector_entry(&mut self, key: &str, batch: &mut WriteBatch) -> Result<()> {
        self.reload_metadata(batch)?;
        let search_key = self.search_key.clone();
        HnswNode::new(key, 0).decode_metadata(&search_key, &batch.overlay(&self.store))?;

        for level in 0..self.metadata.num_levels {
            let mut node = HnswNode::new(key, level);
            match node.decode_neighbours(&search_key, &batch.overlay(&self.store)) {
                Ok(()) => {}
                // A node spans a contiguous range of layers from 0
                Err(e) if e.is_not_found() => break,
                Err(e) => return Err(e),
            }

            for neighbour in node.neighbours.iter() {
                HnswNode::new(neighbour.as_str(), level).remove_neighbour(
                    key,
                    &search_key,
                    &self.store,
                    batch,
                )?;
            }
            node.remove(&search_key, batch);
        }
        HnswNode::new(key, 0).remove_vector(&search_key, batch);

        let mut num_levels = self.metadata.num_levels;
        while num_levels > 0
            && self
                .nodes_at_level_in(&batch.overlay(&self.store), num_levels - 1)?
                .is_empty()
        {
            num_levels -= 1;
        }

        if self.metadata.entry_point.as_deref() == Some(key) {
            let replacement = match num_levels {
                0 => None,
                n => self
                    .nodes_at_level_in(&batch.overlay(&self.store), n - 1)?
                    .into_iter()
                    .next(),
            };
            tracing::debug!(
                "Entry point {} deleted, replaced by {:?} (num_levels={})",
                key,
                replacement,
                num_levels
            );
            self.metadata.entry_point = replacement;
        }
        self.metadata.num_levels = num_levels;
        self.metadata.put(&search_key, batch);
        Ok(())
    }

    /// Apply a record change to the index: delete when the record had a
    /// vector, insert when it has one now. Both land in the same batch.
    pub fn update_vector_entry(
        &mut self,
        key: &str,
        old: Option<&[f64]>,
        new: Option<&[f64]>,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        if old.is_some() {
            self.delete_vector_entry(key, batch)?;
        }
        if let Some(vector) = new {
            self.insert_vector_entry(key, vector, batch)?;
        }
        Ok(())
    }
}
