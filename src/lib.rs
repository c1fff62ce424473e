//! Metadata-only POSIX-like filesystem stored in an ordered key-value
//! store.
//!
//! Every directory entry and inode attribute lives as one record keyed by
//! `(parent_ino, name)`, so an entire namespace flattens into a single
//! ordered table: path resolution becomes a chain of exact-key reads,
//! `readdir` becomes a prefix scan, and each mutation is a single record
//! write serialized by a striped mutex. The store itself is abstract:
//! anything ordered with point reads, writes, and cursors plugs in through
//! [`kv::KvStore`].
//!
//! ```no_run
//! use kvfs::{Filesystem, FilesystemOptions, MemoryKv, User};
//!
//! # async fn demo() -> Result<(), kvfs::FsError> {
//! let fs = Filesystem::open(MemoryKv::new(), FilesystemOptions::default()).await?;
//! let me = User { uid: 1, gid: 1 };
//! fs.mkdir(&me, None, "/projects", 0o770).await?;
//! fs.mkfile(&me, None, "/projects/notes", 0o660).await?;
//! let stat = fs.lstat(&me, None, "/projects/notes").await?;
//! assert!(stat.is_file());
//! fs.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod fs;
pub mod kv;

pub use fs::errors::FsError;
pub use fs::inode::{DirId, Ino, Stat};
pub use fs::metrics::FsStatsSnapshot;
pub use fs::permissions::User;
pub use fs::store::DirHandle;
pub use fs::{Filesystem, FilesystemOptions};
pub use kv::memory::MemoryKv;
pub use kv::{KvCursor, KvError, KvStore};

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
mod posix_tests;
