//! nori-kv: the key-value boundary used by NoriKV secondary indexes.
//!
//! Index engines (such as `nori-hnsw`) are written against three small
//! abstractions instead of a concrete storage engine:
//!
//! - [`KvRead`]: point reads and ordered prefix scans
//! - [`KvEngine`]: point-in-time snapshots and atomic batch commits
//! - [`WriteBatch`]: staged puts/deletes committed as one unit, with a
//!   read-through [`Overlay`] so a multi-step mutation observes its own
//!   staged writes
//!
//! [`MemKv`] implements the contract with an MVCC skiplist in the style of
//! the `nori-lsm` memtable: every committed batch receives one sequence
//! number, and a snapshot is just the sequence number it was opened at.
//!
//! ```text
//!  reader ──► Snapshot(seqno=41) ──┐
//!                                  ├──► SkipMap<(key, Reverse(seqno)), Option<value>>
//!  writer ──► WriteBatch ──commit──┘         (seqno=42 published atomically)
//! ```
//!
//! # Example
//!
//! ```
//! use nori_kv::{KvEngine, KvRead, MemKv, WriteBatch};
//!
//! let kv = MemKv::new();
//! let before = kv.snapshot();
//!
//! let mut batch = WriteBatch::new();
//! batch.put(&b"a"[..], &b"1"[..]);
//! batch.put(&b"b"[..], &b"2"[..]);
//! kv.write(batch).unwrap();
//!
//! assert_eq!(kv.get(b"a").unwrap().as_deref(), Some(&b"1"[..]));
//! assert!(before.get(b"a").unwrap().is_none());
//! ```

mod batch;
mod memkv;

pub use batch::{Overlay, WriteBatch};
pub use bytes::Bytes;
pub use memkv::{MemKv, MemKvSnapshot};

/// Errors surfaced by a storage engine.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage engine error: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, KvError>;

/// Read access to a consistent view of the key space.
pub trait KvRead {
    /// Point lookup. Returns `None` when the key is absent or deleted.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// All live entries whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>>;
}

impl<T: KvRead + ?Sized> KvRead for &T {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        (**self).scan_prefix(prefix)
    }
}

/// A storage engine: live reads, snapshots and atomic batch commits.
///
/// Reading the engine directly observes the latest committed state.
pub trait KvEngine: KvRead {
    /// Repeatable point-in-time view.
    type Snapshot<'a>: KvRead
    where
        Self: 'a;

    /// Opens a snapshot of the latest committed state.
    fn snapshot(&self) -> Self::Snapshot<'_>;

    /// Commits every staged operation of `batch` atomically.
    ///
    /// Returns the sequence number assigned to the batch.
    fn write(&self, batch: WriteBatch) -> Result<u64>;
}
