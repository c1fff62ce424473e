pub mod cache;
pub mod errors;
pub mod inode;
pub mod key_codec;
pub mod lock_manager;
pub mod metrics;
pub mod permissions;
pub mod store;

use self::cache::LookupCache;
use self::errors::FsError;
use self::inode::{DirId, Ino, Stat, ACCESSPERMS, ALLPERMS, ROOT_INO, S_IFDIR, S_IFREG, S_ISVTX};
use self::key_codec::KeyCodec;
use self::lock_manager::LockManager;
use self::metrics::{FsStats, FsStatsSnapshot};
use self::permissions::{is_dir_read_ok, is_dir_write_ok, is_lookup_ok, User};
use self::store::{DirHandle, EntryStore, RootRecord, SuperblockStore};
use crate::kv::KvStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Options for controlling the filesystem.
#[derive(Debug, Clone)]
pub struct FilesystemOptions {
    /// Capacity of the pathname lookup cache, in entries. 0 disables it.
    pub size_lookup_cache: usize,
    /// Skip the pre-insertion existence check in `mkdir`/`mkfile`. For bulk
    /// loading when the caller guarantees uniqueness.
    pub skip_name_collision_checks: bool,
    /// Skip the type check in `unlink` and the emptiness scan in `rmdir`;
    /// both degenerate to blind deletes.
    pub skip_deletion_checks: bool,
    pub skip_perm_checks: bool,
    pub rdonly: bool,
}

impl Default for FilesystemOptions {
    fn default() -> Self {
        Self {
            size_lookup_cache: 0,
            skip_name_collision_checks: false,
            skip_deletion_checks: false,
            skip_perm_checks: false,
            rdonly: false,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn unexpected_mode(mode: u32) -> FsError {
    if mode == S_IFDIR {
        FsError::dir_expected()
    } else if mode == S_IFREG {
        FsError::FileExpected
    } else {
        FsError::AssertionFailed("unexpected file type")
    }
}

fn format_root() -> Stat {
    Stat {
        ino: ROOT_INO,
        size: 0,
        mode: S_IFDIR | S_ISVTX | ACCESSPERMS,
        uid: 0,
        gid: 0,
        mtime: 0,
        ctime: 0,
    }
}

/// Resolver failures are reported against the pathname prefix of the
/// deepest existing ancestor; `p` is the byte offset of the slash preceding
/// the segment that failed.
fn localize_resolve_error(err: FsError, pathname: &str, p: usize) -> FsError {
    let prefix = if p == 0 { "/" } else { &pathname[..p] };
    match err {
        FsError::NotFound(_) => FsError::NotFound(prefix.to_string()),
        FsError::DirExpected(_) => FsError::DirExpected(prefix.to_string()),
        other => other,
    }
}

/// Metadata-only filesystem over an ordered key-value store. Every
/// directory entry is one `(parent_ino, name) -> Stat` record; path
/// resolution is a sequence of exact-key reads; each mutation is a single
/// record write guarded by a striped mutex.
///
/// Thread-safe for an arbitrary mix of readers and writers on one instance.
/// Lock order is stripe locks (ascending) before the cache; the cache is
/// never touched while a store call is in flight.
pub struct Filesystem<S: KvStore> {
    options: FilesystemOptions,
    db: Arc<S>,
    entries: EntryStore<S>,
    superblock: SuperblockStore<S>,
    locks: LockManager,
    cache: Option<LookupCache>,
    stats: Arc<FsStats>,
    rstat: Stat,
    inoseq: AtomicU64,
    /// Root encoding at open time; close only writes the root back when the
    /// current encoding differs.
    prev_root: bytes::Bytes,
}

impl<S: KvStore> Filesystem<S> {
    /// Open a filesystem image stored in `db`. A missing root record means
    /// a fresh image and formats one; an undecodable root record is
    /// `Corruption`.
    pub async fn open(db: S, options: FilesystemOptions) -> Result<Self, FsError> {
        let db = Arc::new(db);
        let stats = Arc::new(FsStats::default());
        let entries = EntryStore::new(db.clone(), stats.clone());
        let superblock = SuperblockStore::new(db.clone(), stats.clone());

        let (root, prev_root) = match superblock.load().await? {
            Some(raw) => {
                let record = RootRecord::from_bytes(&raw)?;
                (record, raw)
            }
            None => {
                debug!("no root record, formatting a fresh image");
                let record = RootRecord {
                    rstat: format_root(),
                    next_ino: 1,
                };
                (record, bytes::Bytes::new())
            }
        };

        let cache = if options.size_lookup_cache > 0 {
            Some(LookupCache::new(options.size_lookup_cache))
        } else {
            None
        };

        Ok(Self {
            options,
            db,
            entries,
            superblock,
            locks: LockManager::new(),
            cache,
            stats,
            rstat: root.rstat,
            inoseq: AtomicU64::new(root.next_ino),
            prev_root,
        })
    }

    /// Persist the root record if it changed, flush the store, and release
    /// the instance. Inode numbers handed out but not yet persisted are
    /// lost on a crash, never reused: the next open resumes from the
    /// persisted counter.
    pub async fn close(self) -> Result<(), FsError> {
        if self.options.rdonly {
            return Ok(());
        }
        let record = RootRecord {
            rstat: self.rstat,
            next_ino: self.inoseq.load(Ordering::SeqCst),
        };
        let encoding = record.to_bytes()?;
        if encoding != self.prev_root {
            self.superblock.save(encoding).await?;
        }
        self.db.flush().await?;
        Ok(())
    }

    pub fn root_stat(&self) -> Stat {
        self.rstat
    }

    /// The next inode number the allocator would hand out.
    pub fn next_ino(&self) -> Ino {
        self.inoseq.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> FsStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn lstat(
        &self,
        who: &User,
        at: Option<&Stat>,
        pathname: &str,
    ) -> Result<Stat, FsError> {
        debug!("lstat: path={}", pathname);
        let at = at.unwrap_or(&self.rstat);
        let (parent, last, tailing) = self.resolve(who, at, pathname).await?;
        if last.is_empty() {
            // The path names the anchor directory itself.
            return Ok(parent);
        }
        let mode = if tailing { S_IFDIR } else { 0 };
        match self.fetch(who, &parent, last.as_bytes(), mode).await {
            // A trailing slash asserted a directory but the entry is a
            // regular file.
            Err(FsError::DirExpected(_)) if tailing => Err(FsError::FileExpected),
            other => other,
        }
    }

    pub async fn mkdir(
        &self,
        who: &User,
        at: Option<&Stat>,
        pathname: &str,
        mode: u32,
    ) -> Result<Stat, FsError> {
        debug!("mkdir: path={} mode={:o}", pathname, mode);
        let at = at.unwrap_or(&self.rstat);
        let (parent, last, _tailing) = self.resolve(who, at, pathname).await?;
        if last.is_empty() {
            return Err(FsError::AlreadyExists);
        }
        self.put(who, &parent, last.as_bytes(), S_IFDIR | (mode & ALLPERMS))
            .await
    }

    pub async fn mkfile(
        &self,
        who: &User,
        at: Option<&Stat>,
        pathname: &str,
        mode: u32,
    ) -> Result<Stat, FsError> {
        debug!("mkfile: path={} mode={:o}", pathname, mode);
        let at = at.unwrap_or(&self.rstat);
        let (parent, last, tailing) = self.resolve(who, at, pathname).await?;
        if last.is_empty() {
            return Err(FsError::AlreadyExists);
        }
        if tailing {
            return Err(FsError::FileExpected);
        }
        self.put(who, &parent, last.as_bytes(), S_IFREG | (mode & ALLPERMS))
            .await
    }

    pub async fn unlink(&self, who: &User, pathname: &str) -> Result<(), FsError> {
        debug!("unlink: path={}", pathname);
        let (parent, last, tailing) = self.resolve(who, &self.rstat, pathname).await?;
        if last.is_empty() {
            return Err(FsError::FileExpected);
        }
        if tailing {
            return Err(FsError::FileExpected);
        }
        self.delete(who, &parent, last.as_bytes()).await
    }

    pub async fn rmdir(&self, who: &User, pathname: &str) -> Result<(), FsError> {
        debug!("rmdir: path={}", pathname);
        let (parent, last, _tailing) = self.resolve(who, &self.rstat, pathname).await?;
        if last.is_empty() {
            return Err(FsError::AssertionFailed("cannot remove the root directory"));
        }
        self.remove_dir(who, &parent, last.as_bytes()).await
    }

    pub async fn opendir(
        &self,
        who: &User,
        at: Option<&Stat>,
        pathname: &str,
    ) -> Result<DirHandle<S::Cursor>, FsError> {
        debug!("opendir: path={}", pathname);
        let at = at.unwrap_or(&self.rstat);
        let (parent, last, _tailing) = self.resolve(who, at, pathname).await?;
        self.seek_to_dir(who, &parent, last.as_bytes()).await
    }

    /// Next entry of an open directory, or `None` at the end. Iteration
    /// observes the snapshot semantics of the engine's cursor; entries
    /// inserted or removed during iteration may or may not appear.
    pub async fn readdir(
        &self,
        dir: &mut DirHandle<S::Cursor>,
    ) -> Result<Option<(Stat, Vec<u8>)>, FsError> {
        self.entries.readdir(dir).await
    }

    pub fn closedir(&self, dir: DirHandle<S::Cursor>) {
        drop(dir);
    }

    /// Resolve a pathname down to its last component. Returns the parent
    /// directory's stat, the last component (empty when the path names the
    /// anchor itself), and whether the path carries a trailing slash.
    ///
    /// The walk is iterative over the input bytes: jump to the next slash,
    /// skip repeated slashes, look the segment up, repeat. Every interior
    /// segment must resolve to a directory.
    async fn resolve<'p>(
        &self,
        who: &User,
        at: &Stat,
        pathname: &'p str,
    ) -> Result<(Stat, &'p str, bool), FsError> {
        let bytes = pathname.as_bytes();
        if bytes.first() != Some(&b'/') {
            return Err(FsError::InvalidArgument("pathname must be absolute"));
        }

        let mut parent = *at;
        let mut p = 0usize;
        let last_end;
        loop {
            // Jump forward to the next path separator.
            let mut q = p + 1;
            while q < bytes.len() && bytes[q] != b'/' {
                q += 1;
            }
            if q == bytes.len() {
                last_end = q;
                break;
            }
            // Empty segment from consecutive slashes.
            if q - p == 1 {
                p = q;
                continue;
            }
            // Look ahead over a run of slashes; reaching the end here means
            // the segment before the run is the last component.
            let mut c = q + 1;
            while c < bytes.len() && bytes[c] == b'/' {
                c += 1;
            }
            if c == bytes.len() {
                last_end = q;
                break;
            }
            let name = &pathname[p + 1..q];
            match self.lookup_with_cache(who, &parent, name).await {
                Ok(stat) => {
                    parent = stat;
                    p = c - 1;
                }
                Err(err) => return Err(localize_resolve_error(err, pathname, p)),
            }
        }

        let last = &pathname[p + 1..last_end];
        let tailing = last_end < bytes.len();
        Ok((parent, last, tailing))
    }

    /// Interior-segment lookup. With the cache enabled, the cache probe,
    /// the store fetch, and the cache fill form one atomic step under the
    /// segment's stripe lock so a concurrent `rmdir` cannot interleave its
    /// delete-and-erase between them. With the cache disabled, the read
    /// goes to the store unlocked.
    async fn lookup_with_cache(
        &self,
        who: &User,
        parent: &Stat,
        name: &str,
    ) -> Result<Stat, FsError> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return self.fetch(who, parent, name.as_bytes(), S_IFDIR).await,
        };
        let key = KeyCodec::lookup_key(DirId::from(parent), name.as_bytes());
        let _guard = self.locks.lock_key(&key).await;
        if let Some(stat) = cache.lookup(&key) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stat);
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let stat = self.fetch(who, parent, name.as_bytes(), S_IFDIR).await?;
        cache.insert(key, stat);
        Ok(stat)
    }

    /// Read one name under `parent`. `mode` restricts the accepted file
    /// type (`S_IFDIR`, `S_IFREG`, or 0 for any).
    async fn fetch(
        &self,
        who: &User,
        parent: &Stat,
        name: &[u8],
        mode: u32,
    ) -> Result<Stat, FsError> {
        if !is_lookup_ok(&self.options, parent, who) {
            return Err(FsError::AccessDenied);
        }
        let stat = self.entries.get(DirId::from(parent), name).await?;
        if stat.mode & mode != mode {
            return Err(unexpected_mode(mode));
        }
        Ok(stat)
    }

    /// Insert a new node under `parent`, checking for name collisions
    /// unless configured away. The collision check and the write hold the
    /// entry's stripe lock so two racing creates serialize: one wins, the
    /// other observes `AlreadyExists`.
    async fn put(
        &self,
        who: &User,
        parent: &Stat,
        name: &[u8],
        mode: u32,
    ) -> Result<Stat, FsError> {
        if !is_dir_write_ok(&self.options, parent, who) {
            return Err(FsError::AccessDenied);
        }
        let pdir = DirId::from(parent);

        let _guard = if !self.options.skip_name_collision_checks {
            let key = KeyCodec::lookup_key(pdir, name);
            let guard = self.locks.lock_key(&key).await;
            match self.entries.get(pdir, name).await {
                Ok(_) => return Err(FsError::AlreadyExists),
                Err(FsError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
            Some(guard)
        } else {
            None
        };

        let now = unix_now();
        let stat = Stat {
            ino: self.inoseq.fetch_add(1, Ordering::SeqCst),
            size: 0,
            mode,
            uid: who.uid,
            gid: who.gid,
            mtime: now,
            ctime: now,
        };
        self.entries.put(pdir, name, &stat).await?;
        Ok(stat)
    }

    /// Remove a regular file. The type check and the delete hold the
    /// entry's stripe lock; with deletion checks skipped this is a blind
    /// unlocked delete.
    async fn delete(&self, who: &User, parent: &Stat, name: &[u8]) -> Result<(), FsError> {
        if !is_dir_write_ok(&self.options, parent, who) {
            return Err(FsError::AccessDenied);
        }
        let pdir = DirId::from(parent);

        let _guard = if !self.options.skip_deletion_checks {
            let key = KeyCodec::lookup_key(pdir, name);
            let guard = self.locks.lock_key(&key).await;
            let stat = self.entries.get(pdir, name).await?;
            if !stat.is_file() {
                return Err(FsError::FileExpected);
            }
            Some(guard)
        } else {
            None
        };

        self.entries.delete(pdir, name).await
    }

    /// Remove a directory. Holds every stripe, in ascending order, so the
    /// emptiness probe cannot race an insertion into the dying directory;
    /// the cache entry is erased inside the same barrier as the delete.
    async fn remove_dir(&self, who: &User, parent: &Stat, name: &[u8]) -> Result<(), FsError> {
        if !is_dir_write_ok(&self.options, parent, who) {
            return Err(FsError::AccessDenied);
        }
        let pdir = DirId::from(parent);

        let _guards = if !self.options.skip_deletion_checks {
            let guards = self.locks.lock_all().await;
            let stat = self.entries.get(pdir, name).await?;
            if !stat.is_dir() {
                return Err(FsError::dir_expected());
            }
            let mut dir = self.entries.opendir(DirId(stat.ino)).await?;
            if self.entries.readdir(&mut dir).await?.is_some() {
                return Err(FsError::DirNotEmpty);
            }
            Some(guards)
        } else {
            None
        };

        self.entries.delete(pdir, name).await?;
        if let Some(cache) = &self.cache {
            cache.erase(&KeyCodec::lookup_key(pdir, name));
        }
        Ok(())
    }

    /// Position a listing cursor at a directory named under `parent`. An
    /// empty name means the anchor directory itself.
    async fn seek_to_dir(
        &self,
        who: &User,
        parent: &Stat,
        name: &[u8],
    ) -> Result<DirHandle<S::Cursor>, FsError> {
        if !is_lookup_ok(&self.options, parent, who) {
            return Err(FsError::AccessDenied);
        }
        if name.is_empty() {
            if !is_dir_read_ok(&self.options, parent, who) {
                return Err(FsError::AccessDenied);
            }
            return self.entries.opendir(DirId(parent.ino)).await;
        }
        let pdir = DirId::from(parent);
        let key = KeyCodec::lookup_key(pdir, name);
        // The entry read and the cursor seek must observe one state.
        let _guard = self.locks.lock_key(&key).await;
        let stat = self.entries.get(pdir, name).await?;
        if !stat.is_dir() {
            return Err(FsError::dir_expected());
        }
        if !is_dir_read_ok(&self.options, &stat, who) {
            return Err(FsError::AccessDenied);
        }
        self.entries.opendir(DirId(stat.ino)).await
    }
}
