use super::inode::Stat;
use super::key_codec::LookupKey;
use moka::sync::Cache;

/// Lookup cache for speeding up pathname resolution. Holds copies of
/// recently resolved *interior directory* stats keyed by
/// `(parent_ino, hash32(name))`; the last component of a path is never
/// cached. Entries are inserted on a miss-then-fetch and erased when the
/// directory is removed, both inside the owning stripe's lock, which keeps
/// the cache a coherent subset of the store.
pub struct LookupCache {
    inner: Cache<LookupKey, Stat>,
}

impl LookupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Cache::builder().max_capacity(capacity as u64).build(),
        }
    }

    pub fn lookup(&self, key: &LookupKey) -> Option<Stat> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: LookupKey, stat: Stat) {
        self.inner.insert(key, stat);
    }

    pub fn erase(&self, key: &LookupKey) {
        self.inner.invalidate(key);
    }
}
