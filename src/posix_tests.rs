//! End-to-end scenarios driving the public filesystem API the way a POSIX
//! layer would.

use crate::fs::errors::FsError;
use crate::fs::inode::Stat;
use crate::fs::permissions::User;
use crate::fs::{Filesystem, FilesystemOptions};
use crate::kv::memory::MemoryKv;

const ME: User = User { uid: 1, gid: 1 };
const DIR_MODE: u32 = 0o770;
const FILE_MODE: u32 = 0o660;

async fn new_fs() -> Filesystem<MemoryKv> {
    crate::test_helpers::init_tracing();
    Filesystem::open(MemoryKv::new(), FilesystemOptions::default())
        .await
        .unwrap()
}

async fn exist(fs: &Filesystem<MemoryKv>, path: &str) -> Result<Stat, FsError> {
    fs.lstat(&ME, None, path).await
}

async fn listdir(fs: &Filesystem<MemoryKv>, path: &str) -> Vec<(Vec<u8>, bool)> {
    let mut dir = fs.opendir(&ME, None, path).await.unwrap();
    let mut entries = Vec::new();
    while let Some((stat, name)) = fs.readdir(&mut dir).await.unwrap() {
        entries.push((name, stat.is_dir()));
    }
    fs.closedir(dir);
    entries
}

#[tokio::test]
async fn test_root_always_exists() {
    let fs = new_fs().await;
    for path in ["/", "//", "///"] {
        let root = exist(&fs, path).await.unwrap();
        assert_eq!(root.ino, 0);
        assert!(root.is_dir());
    }
}

#[tokio::test]
async fn test_basic_tree() {
    let fs = new_fs().await;
    fs.mkdir(&ME, None, "/1", DIR_MODE).await.unwrap();
    fs.mkdir(&ME, None, "/1/a", DIR_MODE).await.unwrap();
    fs.mkfile(&ME, None, "/1/a/x", FILE_MODE).await.unwrap();

    assert!(exist(&fs, "/1").await.unwrap().is_dir());
    assert!(exist(&fs, "/1/a").await.unwrap().is_dir());
    assert!(exist(&fs, "/1/a/x").await.unwrap().is_file());

    assert_eq!(exist(&fs, "/1/a/x/").await, Err(FsError::FileExpected));
    assert!(matches!(exist(&fs, "/2").await, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn test_create_conflicts() {
    let fs = new_fs().await;
    fs.mkfile(&ME, None, "/1", FILE_MODE).await.unwrap();
    assert_eq!(
        fs.mkfile(&ME, None, "/1", FILE_MODE).await,
        Err(FsError::AlreadyExists)
    );
    assert_eq!(
        fs.mkdir(&ME, None, "/1", DIR_MODE).await,
        Err(FsError::AlreadyExists)
    );
    fs.mkfile(&ME, None, "/2", FILE_MODE).await.unwrap();
}

#[tokio::test]
async fn test_path_normalization() {
    let fs = new_fs().await;
    fs.mkdir(&ME, None, "/1", DIR_MODE).await.unwrap();
    let a = fs.mkdir(&ME, None, "/1/a", DIR_MODE).await.unwrap();

    for path in ["/1/a", "//1/a", "/1//a", "///1///a///"] {
        let stat = exist(&fs, path).await.unwrap();
        assert_eq!(stat.ino, a.ino, "path {path} resolved to a different inode");
    }
}

#[tokio::test]
async fn test_deep_resolution() {
    let fs = new_fs().await;
    fs.mkdir(&ME, None, "/1", DIR_MODE).await.unwrap();
    fs.mkdir(&ME, None, "/1/2", DIR_MODE).await.unwrap();
    fs.mkdir(&ME, None, "/1/2/3", DIR_MODE).await.unwrap();
    fs.mkdir(&ME, None, "/1/2/3/4", DIR_MODE).await.unwrap();
    fs.mkdir(&ME, None, "/1/2/3/4/5", DIR_MODE).await.unwrap();
    fs.mkfile(&ME, None, "/1/2/3/4/5/6", FILE_MODE).await.unwrap();

    for path in ["/1", "/1/2", "/1/2/3", "/1/2/3/4", "/1/2/3/4/5"] {
        assert!(exist(&fs, path).await.is_ok());
    }
    assert!(exist(&fs, "/1/2/3/4/5/6").await.unwrap().is_file());

    assert_eq!(
        exist(&fs, "/1/2/3/4/5/6/").await,
        Err(FsError::FileExpected)
    );
    match exist(&fs, "/1/2/4/5").await {
        Err(FsError::NotFound(prefix)) => assert_eq!(prefix, "/1/2"),
        other => panic!("expected localized NotFound, got {other:?}"),
    }
    match fs.mkfile(&ME, None, "/1/2/3/4/5/6/7", FILE_MODE).await {
        Err(FsError::DirExpected(prefix)) => assert_eq!(prefix, "/1/2/3/4/5"),
        other => panic!("expected localized DirExpected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_root() {
    let fs = new_fs().await;
    fs.mkdir(&ME, None, "/1", DIR_MODE).await.unwrap();
    fs.mkfile(&ME, None, "/2", FILE_MODE).await.unwrap();
    fs.mkdir(&ME, None, "/3", DIR_MODE).await.unwrap();

    let entries = listdir(&fs, "/").await;
    assert_eq!(
        entries,
        vec![
            (b"1".to_vec(), true),
            (b"2".to_vec(), false),
            (b"3".to_vec(), true),
        ]
    );
}

#[tokio::test]
async fn test_list_subdirectory() {
    let fs = new_fs().await;
    fs.mkdir(&ME, None, "/1", DIR_MODE).await.unwrap();
    for name in ["a", "c", "e"] {
        fs.mkfile(&ME, None, &format!("/1/{name}"), FILE_MODE)
            .await
            .unwrap();
    }
    for name in ["b", "d"] {
        fs.mkdir(&ME, None, &format!("/1/{name}"), DIR_MODE)
            .await
            .unwrap();
    }

    let entries = listdir(&fs, "/1").await;
    let names: Vec<Vec<u8>> = entries.iter().map(|(name, _)| name.clone()).collect();
    assert_eq!(
        names,
        vec![
            b"a".to_vec(),
            b"b".to_vec(),
            b"c".to_vec(),
            b"d".to_vec(),
            b"e".to_vec(),
        ]
    );
}

#[tokio::test]
async fn test_inode_numbers_increase() {
    let fs = new_fs().await;
    let mut previous = 0;
    for name in ["/a", "/b", "/c", "/d"] {
        let stat = fs.mkfile(&ME, None, name, FILE_MODE).await.unwrap();
        assert!(stat.ino > previous);
        previous = stat.ino;
    }
}

#[tokio::test]
async fn test_persistence_across_reopen() {
    crate::test_helpers::init_tracing();
    let kv = MemoryKv::new();
    let fs = Filesystem::open(kv.clone(), FilesystemOptions::default())
        .await
        .unwrap();
    let created = fs.mkfile(&ME, None, "/1", FILE_MODE).await.unwrap();
    assert_eq!(fs.next_ino(), 2);
    fs.close().await.unwrap();

    let fs = Filesystem::open(kv, FilesystemOptions::default())
        .await
        .unwrap();
    assert_eq!(fs.next_ino(), 2);
    let seen = exist(&fs, "/1").await.unwrap();
    assert_eq!(seen.ino, created.ino);
    for path in ["/", "//", "///"] {
        assert!(exist(&fs, path).await.is_ok());
    }
    // The persisted root record shares the store with the entries but must
    // never show up in a listing.
    assert_eq!(listdir(&fs, "/").await, vec![(b"1".to_vec(), false)]);
}

#[tokio::test]
async fn test_remove_and_recreate() {
    let fs = new_fs().await;
    fs.mkdir(&ME, None, "/d", DIR_MODE).await.unwrap();
    fs.mkfile(&ME, None, "/d/f", FILE_MODE).await.unwrap();

    assert_eq!(fs.rmdir(&ME, "/d").await, Err(FsError::DirNotEmpty));
    fs.unlink(&ME, "/d/f").await.unwrap();
    fs.rmdir(&ME, "/d").await.unwrap();

    // The name is free again and gets a fresh, larger inode number.
    let again = fs.mkdir(&ME, None, "/d", DIR_MODE).await.unwrap();
    assert!(again.ino > 2);
    assert_eq!(listdir(&fs, "/d").await, Vec::new());
}

#[tokio::test]
async fn test_scenarios_with_lookup_cache() {
    crate::test_helpers::init_tracing();
    let fs = Filesystem::open(
        MemoryKv::new(),
        FilesystemOptions {
            size_lookup_cache: 4096,
            ..FilesystemOptions::default()
        },
    )
    .await
    .unwrap();

    fs.mkdir(&ME, None, "/1", DIR_MODE).await.unwrap();
    fs.mkdir(&ME, None, "/1/a", DIR_MODE).await.unwrap();
    fs.mkfile(&ME, None, "/1/a/x", FILE_MODE).await.unwrap();

    // Resolve the same deep path repeatedly; the cache must keep serving
    // the same answers.
    let first = fs.lstat(&ME, None, "/1/a/x").await.unwrap();
    for _ in 0..3 {
        assert_eq!(fs.lstat(&ME, None, "/1/a/x").await.unwrap(), first);
    }
    assert!(fs.stats().cache_hits >= 1);

    assert_eq!(
        fs.lstat(&ME, None, "/1/a/x/").await,
        Err(FsError::FileExpected)
    );
    assert!(matches!(
        fs.lstat(&ME, None, "/1/b/x").await,
        Err(FsError::NotFound(_))
    ));
}
