use super::inode::{DirId, Ino};
use bytes::Bytes;

/// Well-known key of the superblock record.
pub const ROOT_KEY: &[u8] = b"/";

const INO_SIZE: usize = 8;
pub const LOOKUP_KEY_SIZE: usize = INO_SIZE + 4;

/// Fixed-width key of one lookup-cache slot: parent inode followed by the
/// 32-bit name hash. Also the input of stripe selection.
pub type LookupKey = [u8; LOOKUP_KEY_SIZE];

pub struct KeyCodec;

impl KeyCodec {
    /// Key of the `(parent, name)` entry record: 8-byte big-endian parent
    /// inode followed by the raw name bytes. Big-endian keeps byte order
    /// equal to `(parent_ino, name)` order, so a directory's entries form
    /// one contiguous key range.
    pub fn entry_key(parent: DirId, name: &[u8]) -> Bytes {
        let mut key = Vec::with_capacity(INO_SIZE + name.len());
        key.extend_from_slice(&parent.0.to_be_bytes());
        key.extend_from_slice(name);
        Bytes::from(key)
    }

    /// Seek key for scanning a directory's entries: the 8-byte parent inode
    /// with an empty name. Names are non-empty, so every child key is
    /// strictly greater.
    pub fn dir_scan_prefix(dir: DirId) -> Bytes {
        Bytes::copy_from_slice(&dir.0.to_be_bytes())
    }

    /// Split an entry key back into `(parent_ino, name)`. Returns `None`
    /// for keys of other families (the 1-byte root key included).
    pub fn parse_entry_key(key: &[u8]) -> Option<(Ino, &[u8])> {
        if key.len() <= INO_SIZE {
            return None;
        }
        let ino = u64::from_be_bytes(key[..INO_SIZE].try_into().unwrap());
        Some((ino, &key[INO_SIZE..]))
    }

    pub fn lookup_key(parent: DirId, name: &[u8]) -> LookupKey {
        let mut key = [0u8; LOOKUP_KEY_SIZE];
        key[..INO_SIZE].copy_from_slice(&parent.0.to_be_bytes());
        key[INO_SIZE..].copy_from_slice(&hash32(name, 0).to_be_bytes());
        key
    }
}

/// Stable non-cryptographic hash used for lookup-cache keys and stripe
/// selection. The mix must not change between versions: cache keys are
/// recomputed per process, but stripe assignment feeds the lock discipline
/// tests.
pub fn hash32(data: &[u8], seed: u32) -> u32 {
    const M: u32 = 0xc6a4a793;
    const R: u32 = 24;
    let mut h = seed ^ (data.len() as u32).wrapping_mul(M);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let w = u32::from_le_bytes(chunk.try_into().unwrap());
        h = h.wrapping_add(w).wrapping_mul(M);
        h ^= h >> 16;
    }

    let rest = chunks.remainder();
    if rest.len() >= 3 {
        h = h.wrapping_add((rest[2] as u32) << 16);
    }
    if rest.len() >= 2 {
        h = h.wrapping_add((rest[1] as u32) << 8);
    }
    if !rest.is_empty() {
        h = h.wrapping_add(rest[0] as u32);
        h = h.wrapping_mul(M);
        h ^= h >> R;
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_key_layout() {
        let key = KeyCodec::entry_key(DirId(42), b"file.txt");
        assert_eq!(&key[..8], &42u64.to_be_bytes());
        assert_eq!(&key[8..], b"file.txt");
    }

    #[test]
    fn test_entry_key_order_matches_pair_order() {
        let pairs: [(u64, &[u8]); 5] = [
            (0, b"a"),
            (0, b"b"),
            (1, b"0"),
            (255, b"z"),
            (256, b"a"),
        ];
        let keys: Vec<Bytes> = pairs
            .iter()
            .map(|(ino, name)| KeyCodec::entry_key(DirId(*ino), name))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_parse_entry_key() {
        let key = KeyCodec::entry_key(DirId(9), b"name");
        let (ino, name) = KeyCodec::parse_entry_key(&key).unwrap();
        assert_eq!(ino, 9);
        assert_eq!(name, b"name");

        assert!(KeyCodec::parse_entry_key(ROOT_KEY).is_none());
        assert!(KeyCodec::parse_entry_key(&KeyCodec::dir_scan_prefix(DirId(9))).is_none());
    }

    #[test]
    fn test_root_key_outside_every_scan_range() {
        // Entry keys are at least 9 bytes; the 1-byte root key sorts before
        // the 8-byte scan prefix of any directory it could shadow.
        let prefix = KeyCodec::dir_scan_prefix(DirId(0x2F00000000000000));
        assert!(ROOT_KEY < &prefix[..]);
    }

    #[test]
    fn test_lookup_key_is_stable() {
        let a = KeyCodec::lookup_key(DirId(3), b"dir");
        let b = KeyCodec::lookup_key(DirId(3), b"dir");
        assert_eq!(a, b);
        assert_eq!(&a[..8], &3u64.to_be_bytes());

        let other = KeyCodec::lookup_key(DirId(3), b"rid");
        assert_ne!(a, other);
    }

    #[test]
    fn test_hash32_seed_and_tail() {
        assert_eq!(hash32(b"abc", 0), hash32(b"abc", 0));
        assert_ne!(hash32(b"abc", 0), hash32(b"abc", 1));
        // Exercise every tail length.
        for name in [&b""[..], b"a", b"ab", b"abc", b"abcd", b"abcde"] {
            let _ = hash32(name, 0);
        }
        assert_ne!(hash32(b"abcd", 0), hash32(b"abce", 0));
    }
}
