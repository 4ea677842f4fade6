//! Synthetic attribute generation.
//!
//! Attributes are fabricated on every call and never cached. Sizes are
//! always zero since nothing written is ever kept.

use crate::classify::{classify, PathKind};
use crate::error::{FsError, FsResult};
use std::time::SystemTime;

/// Permission bits reported for directories (`ACCESSPERMS`, rwxrwxrwx).
pub const DIR_PERM: u16 = 0o777;

/// Permission bits reported for files (`DEFFILEMODE`, rw-rw-rw-).
pub const FILE_PERM: u16 = 0o666;

/// Link count reported for directories (itself plus `.`).
pub const DIR_NLINK: u32 = 2;

/// Link count reported for files.
pub const FILE_NLINK: u32 = 1;

/// Moment the filesystem came up.
///
/// Captured once and copied into whatever needs it; it is the only
/// process-wide value the filesystem carries. Directories report it as their
/// modify and change time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartTime(SystemTime);

impl StartTime {
    /// Captures the current time.
    pub fn now() -> Self {
        Self(SystemTime::now())
    }

    /// Uses a fixed time (tests, replays).
    pub fn at(time: SystemTime) -> Self {
        Self(time)
    }

    pub fn get(self) -> SystemTime {
        self.0
    }
}

/// Metadata fabricated for a classified path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticAttributes {
    pub kind: PathKind,
    pub perm: u16,
    pub nlink: u32,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl SyntheticAttributes {
    /// Attributes of a directory observed at `now`.
    pub fn directory(started: StartTime, now: SystemTime) -> Self {
        Self {
            kind: PathKind::Directory,
            perm: DIR_PERM,
            nlink: DIR_NLINK,
            size: 0,
            atime: now,
            mtime: started.get(),
            ctime: started.get(),
        }
    }

    /// Attributes of a file observed at `now`. All timestamps are `now`.
    pub fn file(now: SystemTime) -> Self {
        Self {
            kind: PathKind::File,
            perm: FILE_PERM,
            nlink: FILE_NLINK,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Allocated 512-byte blocks. Nothing is ever allocated.
    pub fn blocks(&self) -> u64 {
        0
    }
}

/// Synthesizes attributes for `path`.
///
/// Fails only when the path itself is absent; every present path resolves to
/// something.
pub fn synthesize(path: Option<&str>, started: StartTime) -> FsResult<SyntheticAttributes> {
    let path = path.ok_or(FsError::MissingPath)?;
    let now = SystemTime::now();

    Ok(match classify(path) {
        PathKind::Directory => SyntheticAttributes::directory(started, now),
        PathKind::File => SyntheticAttributes::file(now),
    })
}
