//! The operation table.
//!
//! [`PathFilesystem`] is the capability set a path-based host calls into, one
//! method per filesystem callback. [`NullFs`] is the implementation: reads
//! come back empty, writes are acknowledged and dropped, and every metadata
//! mutation succeeds without changing anything observable.

use crate::attr::{synthesize, StartTime, SyntheticAttributes};
use crate::classify::{classify, PathKind};
use crate::error::{FsError, FsResult};
use bytes::Bytes;
use std::time::SystemTime;

/// Entries listed for every directory, in order.
pub const DIRECTORY_ENTRIES: [&str; 2] = [".", ".."];

/// A timestamp argument to [`PathFilesystem::utimens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// The time of the call (`UTIME_NOW`).
    Now,
    /// An explicit time.
    At(SystemTime),
}

/// Path-addressed filesystem callbacks.
///
/// Implementations are invoked concurrently, from any thread, for overlapping
/// paths, which is why every method takes `&self`.
pub trait PathFilesystem: Send + Sync {
    /// Returns the attributes of `path`. `None` means the host had no path.
    fn getattr(&self, path: Option<&str>) -> FsResult<SyntheticAttributes>;

    /// Lists `path`, handing each name to `filler` in order.
    ///
    /// `filler` returns `true` once the host's buffer is full; no further
    /// names are emitted after that.
    fn readdir(&self, path: &str, filler: &mut dyn FnMut(&str) -> bool) -> FsResult<()>;

    fn open(&self, path: &str, flags: i32) -> FsResult<()>;

    /// Reads up to `size` bytes at `offset`.
    fn read(&self, path: &str, size: u32, offset: i64) -> FsResult<Bytes>;

    /// Writes `data` at `offset`, returning the number of bytes accepted.
    fn write(&self, path: &str, data: &[u8], offset: i64) -> FsResult<usize>;

    fn create(&self, path: &str, mode: u32) -> FsResult<()>;

    fn unlink(&self, path: &str) -> FsResult<()>;

    fn rmdir(&self, path: &str) -> FsResult<()>;

    fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    fn truncate(&self, path: &str, size: u64) -> FsResult<()>;

    fn chmod(&self, path: &str, mode: u32) -> FsResult<()>;

    /// Changes ownership. `None` leaves that id unchanged.
    fn chown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> FsResult<()>;

    /// Sets access and modify times. `None` leaves that time unchanged.
    fn utimens(&self, path: &str, atime: Option<TimeSpec>, mtime: Option<TimeSpec>)
        -> FsResult<()>;
}

/// The null filesystem.
///
/// Holds nothing but the time it was created, so sharing it across threads
/// needs no locking.
#[derive(Debug, Clone, Copy)]
pub struct NullFs {
    started: StartTime,
}

impl NullFs {
    /// Creates a filesystem whose directories report the current time as
    /// their modify/change time.
    pub fn new() -> Self {
        Self::with_start_time(StartTime::now())
    }

    pub fn with_start_time(started: StartTime) -> Self {
        Self { started }
    }

    pub fn start_time(&self) -> StartTime {
        self.started
    }

    /// Fails unless `path` classifies as `expected`.
    fn require(path: &str, expected: PathKind) -> FsResult<()> {
        let kind = classify(path);
        if kind == expected {
            Ok(())
        } else {
            Err(FsError::not_found(path, kind))
        }
    }
}

impl Default for NullFs {
    fn default() -> Self {
        Self::new()
    }
}

impl PathFilesystem for NullFs {
    fn getattr(&self, path: Option<&str>) -> FsResult<SyntheticAttributes> {
        synthesize(path, self.started)
    }

    fn readdir(&self, path: &str, filler: &mut dyn FnMut(&str) -> bool) -> FsResult<()> {
        Self::require(path, PathKind::Directory)?;
        for name in DIRECTORY_ENTRIES {
            if filler(name) {
                break;
            }
        }
        Ok(())
    }

    fn open(&self, path: &str, _flags: i32) -> FsResult<()> {
        Self::require(path, PathKind::File)
    }

    fn read(&self, path: &str, _size: u32, _offset: i64) -> FsResult<Bytes> {
        Self::require(path, PathKind::File)?;
        Ok(Bytes::new())
    }

    fn write(&self, path: &str, data: &[u8], _offset: i64) -> FsResult<usize> {
        Self::require(path, PathKind::File)?;
        Ok(data.len())
    }

    fn create(&self, _path: &str, _mode: u32) -> FsResult<()> {
        Ok(())
    }

    fn unlink(&self, _path: &str) -> FsResult<()> {
        Ok(())
    }

    fn rmdir(&self, path: &str) -> FsResult<()> {
        self.unlink(path)
    }

    fn rename(&self, _from: &str, _to: &str) -> FsResult<()> {
        Ok(())
    }

    fn truncate(&self, _path: &str, _size: u64) -> FsResult<()> {
        Ok(())
    }

    fn chmod(&self, _path: &str, _mode: u32) -> FsResult<()> {
        Ok(())
    }

    fn chown(&self, _path: &str, _uid: Option<u32>, _gid: Option<u32>) -> FsResult<()> {
        Ok(())
    }

    fn utimens(
        &self,
        _path: &str,
        _atime: Option<TimeSpec>,
        _mtime: Option<TimeSpec>,
    ) -> FsResult<()> {
        Ok(())
    }
}
