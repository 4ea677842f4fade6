//! Error handling and mapping for the FUSE bridge.
//!
//! Everything the bridge can fail with ends up as a POSIX error code in a
//! kernel reply.

use nullfs_core::FsError;
use std::io;
use thiserror::Error;

/// Errors raised while serving a FUSE request.
#[derive(Debug, Error)]
pub enum FuseError {
    /// The filesystem rejected the operation.
    #[error("Filesystem operation failed: {0}")]
    Fs(#[from] FsError),

    /// The kernel referenced an inode the table does not know.
    #[error("Invalid inode: {0}")]
    InvalidInode(u64),

    /// A name that is not valid UTF-8.
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FuseError {
    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            FuseError::Fs(e) => fs_error_to_errno(e),
            FuseError::InvalidInode(_) => libc::ENOENT,
            FuseError::InvalidName(_) => libc::EINVAL,
            FuseError::Io(e) => io_error_to_errno(e),
        }
    }
}

/// Converts a filesystem error to a libc error code.
///
/// The null filesystem only ever fails with "no such entry".
pub fn fs_error_to_errno(e: &FsError) -> i32 {
    match e {
        FsError::MissingPath | FsError::NotFound { .. } => libc::ENOENT,
    }
}

/// Converts an IO error to a libc error code.
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Result type for FUSE operations.
pub type FuseResult<T> = Result<T, FuseError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for FsError {
    fn to_errno(&self) -> i32 {
        fs_error_to_errno(self)
    }
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}

impl ToErrno for FuseError {
    fn to_errno(&self) -> i32 {
        FuseError::to_errno(self)
    }
}
