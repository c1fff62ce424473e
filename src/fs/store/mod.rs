pub mod entry;
pub mod superblock;

pub use entry::{DirHandle, EntryStore};
pub use superblock::{RootRecord, SuperblockStore};
