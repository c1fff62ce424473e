use super::{KvCursor, KvError, KvStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered in-memory key-value engine. This is the reference port used by
/// the test suite; clones share the same underlying map, so re-opening a
/// filesystem on a clone models closing and re-opening the same image.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    map: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }
}

/// Cursor over a point-in-time copy of the tail of the map. Writes issued
/// after the cursor is opened are not observed.
pub struct MemoryCursor {
    entries: std::vec::IntoIter<(Bytes, Bytes)>,
}

#[async_trait]
impl KvCursor for MemoryCursor {
    async fn next(&mut self) -> Result<Option<(Bytes, Bytes)>, KvError> {
        Ok(self.entries.next())
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    type Cursor = MemoryCursor;

    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, KvError> {
        Ok(self.map.read().await.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: Bytes) -> Result<(), KvError> {
        self.map.write().await.insert(key.to_vec(), value);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.map.write().await.remove(key);
        Ok(())
    }

    async fn scan_from(&self, start: &[u8]) -> Result<Self::Cursor, KvError> {
        let snapshot: Vec<(Bytes, Bytes)> = self
            .map
            .read()
            .await
            .range(start.to_vec()..)
            .map(|(k, v)| (Bytes::copy_from_slice(k), v.clone()))
            .collect();
        Ok(MemoryCursor {
            entries: snapshot.into_iter(),
        })
    }

    async fn flush(&self) -> Result<(), KvError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get(b"a").await.unwrap(), None);

        kv.put(b"a", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(kv.get(b"a").await.unwrap(), Some(Bytes::from_static(b"1")));

        kv.put(b"a", Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(kv.get(b"a").await.unwrap(), Some(Bytes::from_static(b"2")));

        kv.delete(b"a").await.unwrap();
        assert_eq!(kv.get(b"a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_is_ordered() {
        let kv = MemoryKv::new();
        for key in [&b"b"[..], b"a", b"d", b"c"] {
            kv.put(key, Bytes::copy_from_slice(key)).await.unwrap();
        }

        let mut cursor = kv.scan_from(b"b").await.unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = cursor.next().await.unwrap() {
            seen.push(k);
        }
        assert_eq!(seen, vec![Bytes::from_static(b"b"), Bytes::from_static(b"c"), Bytes::from_static(b"d")]);
    }

    #[tokio::test]
    async fn test_scan_snapshot_isolation() {
        let kv = MemoryKv::new();
        kv.put(b"a", Bytes::from_static(b"1")).await.unwrap();

        let mut cursor = kv.scan_from(b"").await.unwrap();
        kv.put(b"b", Bytes::from_static(b"2")).await.unwrap();

        assert!(cursor.next().await.unwrap().is_some());
        assert!(cursor.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let kv = MemoryKv::new();
        kv.put(b"k", Bytes::from_static(b"v")).await.unwrap();

        let other = kv.clone();
        assert_eq!(other.get(b"k").await.unwrap(), Some(Bytes::from_static(b"v")));
        assert_eq!(other.len().await, 1);
    }
}
