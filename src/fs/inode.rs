use super::errors::FsError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub type Ino = u64;

/// Inode number of the root directory. Never allocated to any other entry.
pub const ROOT_INO: Ino = 0;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_ISVTX: u32 = 0o1000;
pub const ACCESSPERMS: u32 = 0o777;
pub const ALLPERMS: u32 = 0o7777;

/// Full attribute record of one filesystem node. One of these is the value
/// of every directory entry in the store; construction through a struct
/// literal guarantees no field is left unset before it is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub ino: Ino,
    pub size: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: u64,
    pub ctime: u64,
}

impl Stat {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn to_bytes(&self) -> Result<Bytes, FsError> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(|_| FsError::Corruption("stat failed to encode"))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, FsError> {
        bincode::deserialize(data).map_err(|_| FsError::Corruption("stat failed to decode"))
    }
}

/// Scoping identifier used to compose child entry keys. Equal to the
/// directory's inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(pub Ino);

impl From<&Stat> for DirId {
    fn from(stat: &Stat) -> Self {
        DirId(stat.ino)
    }
}
