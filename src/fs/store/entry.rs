use crate::fs::errors::FsError;
use crate::fs::inode::{DirId, Stat};
use crate::fs::key_codec::KeyCodec;
use crate::fs::metrics::FsStats;
use crate::kv::{KvCursor, KvStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

/// Store of `(parent, name) -> Stat` entry records. One record per live
/// name; absence of the record is non-existence.
pub struct EntryStore<S: KvStore> {
    db: Arc<S>,
    stats: Arc<FsStats>,
}

/// Open directory listing. Wraps an engine cursor positioned inside the
/// directory's key range; `done` latches once the range is left.
pub struct DirHandle<C> {
    dir: DirId,
    cursor: C,
    done: bool,
}

impl<C> DirHandle<C> {
    pub fn dir(&self) -> DirId {
        self.dir
    }
}

impl<S: KvStore> EntryStore<S> {
    pub fn new(db: Arc<S>, stats: Arc<FsStats>) -> Self {
        Self { db, stats }
    }

    pub async fn get(&self, parent: DirId, name: &[u8]) -> Result<Stat, FsError> {
        let key = KeyCodec::entry_key(parent, name);
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        let data = self
            .db
            .get(&key)
            .await?
            .ok_or_else(FsError::not_found)?;
        Stat::from_bytes(&data).map_err(|err| {
            warn!(
                parent = parent.0,
                name = %String::from_utf8_lossy(name),
                "entry record failed to decode"
            );
            err
        })
    }

    pub async fn put(&self, parent: DirId, name: &[u8], stat: &Stat) -> Result<(), FsError> {
        let key = KeyCodec::entry_key(parent, name);
        let value = stat.to_bytes()?;
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        self.db.put(&key, value).await?;
        Ok(())
    }

    pub async fn delete(&self, parent: DirId, name: &[u8]) -> Result<(), FsError> {
        let key = KeyCodec::entry_key(parent, name);
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        self.db.delete(&key).await?;
        Ok(())
    }

    /// Seek a cursor to the first entry of `dir`.
    pub async fn opendir(&self, dir: DirId) -> Result<DirHandle<S::Cursor>, FsError> {
        self.stats.scans.fetch_add(1, Ordering::Relaxed);
        let cursor = self.db.scan_from(&KeyCodec::dir_scan_prefix(dir)).await?;
        Ok(DirHandle {
            dir,
            cursor,
            done: false,
        })
    }

    /// Next child of the handle's directory, or `None` once the cursor
    /// leaves the directory's key range.
    pub async fn readdir(
        &self,
        handle: &mut DirHandle<S::Cursor>,
    ) -> Result<Option<(Stat, Vec<u8>)>, FsError> {
        if handle.done {
            return Ok(None);
        }
        match handle.cursor.next().await? {
            Some((key, value)) => match KeyCodec::parse_entry_key(&key) {
                Some((ino, name)) if ino == handle.dir.0 => {
                    let stat = Stat::from_bytes(&value)?;
                    Ok(Some((stat, name.to_vec())))
                }
                _ => {
                    handle.done = true;
                    Ok(None)
                }
            },
            None => {
                handle.done = true;
                Ok(None)
            }
        }
    }
}
