//! Write batches with read-through.

use crate::{KvRead, Result};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Staged writes committed as one atomic unit.
///
/// Operations on the same key collapse: the last staged put or delete wins.
/// Nothing is visible to other readers until the batch is handed to
/// [`KvEngine::write`](crate::KvEngine::write).
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// key -> Some(value) for puts, None for deletes
    ops: BTreeMap<Bytes, Option<Bytes>>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a put.
    pub fn put(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.ops.insert(key.into(), Some(value.into()));
    }

    /// Stage a delete (tombstone).
    pub fn delete(&mut self, key: impl Into<Bytes>) {
        self.ops.insert(key.into(), None);
    }

    /// Look up a staged operation.
    ///
    /// - `None`: the batch does not touch `key`
    /// - `Some(None)`: the batch deletes `key`
    /// - `Some(Some(v))`: the batch writes `v`
    pub fn staged(&self, key: &[u8]) -> Option<Option<&Bytes>> {
        self.ops.get(key).map(|v| v.as_ref())
    }

    /// Number of distinct keys touched.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drop every staged operation.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Iterate staged operations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, Option<&Bytes>)> {
        self.ops.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// Read view that answers from this batch first and falls back to `db`.
    pub fn overlay<'a, R: KvRead>(&'a self, db: &'a R) -> Overlay<'a, R> {
        Overlay { batch: self, db }
    }
}

impl IntoIterator for WriteBatch {
    type Item = (Bytes, Option<Bytes>);
    type IntoIter = std::collections::btree_map::IntoIter<Bytes, Option<Bytes>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Batch-over-store read view (see [`WriteBatch::overlay`]).
pub struct Overlay<'a, R> {
    batch: &'a WriteBatch,
    db: &'a R,
}

impl<R: KvRead> KvRead for Overlay<'_, R> {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        match self.batch.staged(key) {
            Some(staged) => Ok(staged.cloned()),
            None => self.db.get(key),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        let mut merged: BTreeMap<Bytes, Bytes> = self.db.scan_prefix(prefix)?.into_iter().collect();

        let staged = self
            .batch
            .ops
            .range::<[u8], _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        for (key, op) in staged {
            match op {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KvEngine, MemKv};

    #[test]
    fn test_last_write_wins() {
        let mut batch = WriteBatch::new();
        batch.put(&b"k"[..], &b"1"[..]);
        batch.put(&b"k"[..], &b"2"[..]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.staged(b"k"), Some(Some(&Bytes::from_static(b"2"))));

        batch.delete(&b"k"[..]);
        assert_eq!(batch.staged(b"k"), Some(None));
        assert_eq!(batch.staged(b"other"), None);
    }

    #[test]
    fn test_overlay_get() {
        let kv = MemKv::new();
        let mut seed = WriteBatch::new();
        seed.put(&b"a"[..], &b"db"[..]);
        seed.put(&b"b"[..], &b"db"[..]);
        kv.write(seed).unwrap();

        let mut batch = WriteBatch::new();
        batch.put(&b"a"[..], &b"staged"[..]);
        batch.delete(&b"b"[..]);

        let view = batch.overlay(&kv);
        assert_eq!(view.get(b"a").unwrap().as_deref(), Some(&b"staged"[..]));
        assert!(view.get(b"b").unwrap().is_none());

        // The store itself is untouched until commit
        assert_eq!(kv.get(b"b").unwrap().as_deref(), Some(&b"db"[..]));
    }

    #[test]
    fn test_overlay_scan_prefix() {
        let kv = MemKv::new();
        let mut seed = WriteBatch::new();
        seed.put(&b"p/1"[..], &b"a"[..]);
        seed.put(&b"p/2"[..], &b"b"[..]);
        seed.put(&b"q/1"[..], &b"c"[..]);
        kv.write(seed).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(&b"p/1"[..]);
        batch.put(&b"p/3"[..], &b"d"[..]);
        batch.put(&b"q/2"[..], &b"e"[..]);

        let keys: Vec<_> = batch
            .overlay(&kv)
            .scan_prefix(b"p/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![Bytes::from_static(b"p/2"), Bytes::from_static(b"p/3")]);
    }
}
