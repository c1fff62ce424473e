use crate::fs::errors::FsError;
use crate::fs::inode::{Ino, Stat};
use crate::fs::key_codec::ROOT_KEY;
use crate::fs::metrics::FsStats;
use crate::kv::KvStore;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Persistent root of a filesystem image: the root directory's stat and the
/// next inode number to hand out. Encoded deterministically so the close
/// path can compare encodings and skip the write when nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRecord {
    pub rstat: Stat,
    pub next_ino: Ino,
}

impl RootRecord {
    pub fn to_bytes(&self) -> Result<Bytes, FsError> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(|_| FsError::Corruption("root record failed to encode"))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, FsError> {
        bincode::deserialize(data).map_err(|_| FsError::Corruption("cannot recover filesystem root"))
    }
}

pub struct SuperblockStore<S: KvStore> {
    db: Arc<S>,
    stats: Arc<FsStats>,
}

impl<S: KvStore> SuperblockStore<S> {
    pub fn new(db: Arc<S>, stats: Arc<FsStats>) -> Self {
        Self { db, stats }
    }

    /// Raw root record bytes, or `None` on a fresh image.
    pub async fn load(&self) -> Result<Option<Bytes>, FsError> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.db.get(ROOT_KEY).await?)
    }

    pub async fn save(&self, encoding: Bytes) -> Result<(), FsError> {
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        self.db.put(ROOT_KEY, encoding).await?;
        Ok(())
    }
}
