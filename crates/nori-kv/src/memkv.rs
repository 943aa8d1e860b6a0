//! In-process MVCC key-value engine.

use crate::{KvEngine, KvRead, Result, WriteBatch};
use bytes::Bytes;
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};

/// Skiplist key: user key, then sequence number descending so the newest
/// version of a key sorts first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct VersionedKey {
    key: Bytes,
    seqno: Reverse<u64>,
}

impl VersionedKey {
    fn new(key: Bytes, seqno: u64) -> Self {
        Self {
            key,
            seqno: Reverse(seqno),
        }
    }
}

/// Multi-version in-memory engine.
///
/// # Concurrency
/// Reads are lock-free (`crossbeam_skiplist::SkipMap`). Commits are
/// serialized by a mutex: a batch is inserted under a fresh sequence number
/// and only then published through `visible_seqno`, so readers observe either
/// none or all of a batch.
///
/// # Memory Layout
/// ```text
/// SkipMap<(key, Reverse(seqno)), Option<value>>
///   ("a", 7) → Some(v3)
///   ("a", 2) → Some(v1)
///   ("b", 5) → None        (tombstone)
/// ```
pub struct MemKv {
    data: SkipMap<VersionedKey, Option<Bytes>>,

    /// Highest sequence number whose batch is fully inserted
    visible_seqno: AtomicU64,

    /// Serializes commits
    write_lock: Mutex<()>,
}

impl Default for MemKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemKv {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self {
            data: SkipMap::new(),
            visible_seqno: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Sequence number of the latest committed batch.
    pub fn last_seqno(&self) -> u64 {
        self.visible_seqno.load(Ordering::Acquire)
    }

    /// Approximate number of stored versions (including tombstones).
    pub fn version_count(&self) -> usize {
        self.data.len()
    }

    fn get_at(&self, key: &[u8], seqno: u64) -> Option<Bytes> {
        let lower = VersionedKey::new(Bytes::copy_from_slice(key), seqno);
        let entry = self.data.range(lower..).next()?;
        if entry.key().key.as_ref() != key {
            return None;
        }
        entry.value().clone()
    }

    fn scan_prefix_at(&self, prefix: &[u8], seqno: u64) -> Vec<(Bytes, Bytes)> {
        let start = VersionedKey::new(Bytes::copy_from_slice(prefix), u64::MAX);
        let mut out = Vec::new();
        let mut current: Option<Bytes> = None;

        for entry in self.data.range(start..) {
            let vk = entry.key();
            if !vk.key.starts_with(prefix) {
                break;
            }
            if vk.seqno.0 > seqno {
                continue;
            }
            // Older versions of a key already resolved
            if current.as_ref() == Some(&vk.key) {
                continue;
            }
            current = Some(vk.key.clone());
            if let Some(value) = entry.value() {
                out.push((vk.key.clone(), value.clone()));
            }
        }

        out
    }
}

impl KvRead for MemKv {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.get_at(key, self.last_seqno()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        Ok(self.scan_prefix_at(prefix, self.last_seqno()))
    }
}

impl KvEngine for MemKv {
    type Snapshot<'a> = MemKvSnapshot<'a>;

    fn snapshot(&self) -> MemKvSnapshot<'_> {
        MemKvSnapshot {
            kv: self,
            seqno: self.last_seqno(),
        }
    }

    fn write(&self, batch: WriteBatch) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let seqno = self.visible_seqno.load(Ordering::Acquire) + 1;
        let ops = batch.len();

        for (key, value) in batch {
            self.data.insert(VersionedKey::new(key, seqno), value);
        }

        self.visible_seqno.store(seqno, Ordering::Release);
        tracing::trace!(seqno, ops, "committed write batch");
        Ok(seqno)
    }
}

/// Point-in-time view of a [`MemKv`].
#[derive(Clone, Copy)]
pub struct MemKvSnapshot<'a> {
    kv: &'a MemKv,
    seqno: u64,
}

impl MemKvSnapshot<'_> {
    /// Sequence number this snapshot reads at.
    pub fn seqno(&self) -> u64 {
        self.seqno
    }
}

impl KvRead for MemKvSnapshot<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.kv.get_at(key, self.seqno))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        Ok(self.kv.scan_prefix_at(prefix, self.seqno))
    }
}
