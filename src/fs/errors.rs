use crate::kv::KvError;
use thiserror::Error;

/// Error taxonomy of the metadata layer. Operations fail fast: nothing is
/// retried, and engine errors surface verbatim as `Io`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// A path component does not exist. When raised by the path resolver
    /// the payload is the pathname prefix of the deepest existing ancestor.
    #[error("not found: {0:?}")]
    NotFound(String),

    #[error("already exists")]
    AlreadyExists,

    /// An interior path component is not a directory. When raised by the
    /// path resolver the payload localizes the failure like `NotFound`.
    #[error("directory expected: {0:?}")]
    DirExpected(String),

    /// A directory was named where a regular file is required, or a regular
    /// file was referred to with a trailing slash.
    #[error("file expected")]
    FileExpected,

    #[error("directory not empty")]
    DirNotEmpty,

    #[error("access denied")]
    AccessDenied,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("assertion failed: {0}")]
    AssertionFailed(&'static str),

    #[error("corruption: {0}")]
    Corruption(&'static str),

    #[error("kv store error: {0}")]
    Io(#[from] KvError),
}

impl FsError {
    pub(crate) fn not_found() -> Self {
        FsError::NotFound(String::new())
    }

    pub(crate) fn dir_expected() -> Self {
        FsError::DirExpected(String::new())
    }

    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::DirExpected(_) => libc::ENOTDIR,
            FsError::FileExpected => libc::EISDIR,
            FsError::DirNotEmpty => libc::ENOTEMPTY,
            FsError::AccessDenied => libc::EACCES,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::AssertionFailed(_) => libc::EINVAL,
            FsError::Corruption(_) => libc::EIO,
            FsError::Io(_) => libc::EIO,
        }
    }
}
