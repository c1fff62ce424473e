pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    #[error("i/o error: {0}")]
    Io(String),
}

/// Capability interface over an ordered key-value store. The filesystem core
/// is generic over this trait; LSM engines, embedded databases, and the
/// bundled in-memory store all plug in here.
///
/// Absence of a key is not an error: `get` returns `None`. Cursors yield
/// entries in ascending byte-lexicographic key order starting at the seek
/// key, and observe whatever snapshot semantics the engine's iterators have.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    type Cursor: KvCursor;

    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, KvError>;

    async fn put(&self, key: &[u8], value: Bytes) -> Result<(), KvError>;

    async fn delete(&self, key: &[u8]) -> Result<(), KvError>;

    /// Open a cursor positioned at the first key >= `start`.
    async fn scan_from(&self, start: &[u8]) -> Result<Self::Cursor, KvError>;

    /// Make all writes issued so far durable.
    async fn flush(&self) -> Result<(), KvError>;
}

#[async_trait]
pub trait KvCursor: Send + 'static {
    /// Advance and return the next `(key, value)` pair, or `None` when the
    /// cursor is exhausted.
    async fn next(&mut self) -> Result<Option<(Bytes, Bytes)>, KvError>;
}
