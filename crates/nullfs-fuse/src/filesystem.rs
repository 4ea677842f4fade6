//! FUSE filesystem implementation.
//!
//! [`FuseBridge`] implements the fuser `Filesystem` trait on top of any
//! [`PathFilesystem`], translating inode-addressed kernel requests into
//! path-addressed calls and the results back into kernel replies.

use crate::config::MountConfig;
use crate::error::{FuseError, FuseResult};
use crate::inode::{join_path, parent_path, InodeTable, ROOT_INODE};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::c_int;
use nullfs_core::{classify, PathFilesystem, PathKind, SyntheticAttributes, TimeSpec};
use std::ffi::OsStr;
use std::time::SystemTime;
use tracing::{debug, info, trace};

/// Block size for filesystem statistics.
const BLOCK_SIZE: u32 = 4096;

/// Maximum file name length reported by `statfs`.
const NAME_MAX: u32 = 255;

/// Inode number libfuse reports for directory entries it has no number for.
const UNKNOWN_INO: u64 = 0xffff_ffff;

/// Converts a kernel time argument to the path filesystem's form.
fn time_spec(time: TimeOrNow) -> TimeSpec {
    match time {
        TimeOrNow::Now => TimeSpec::Now,
        TimeOrNow::SpecificTime(t) => TimeSpec::At(t),
    }
}

fn file_type(kind: PathKind) -> FileType {
    match kind {
        PathKind::Directory => FileType::Directory,
        PathKind::File => FileType::RegularFile,
    }
}

/// Borrows a kernel-supplied name as UTF-8.
fn name_str(name: &OsStr) -> FuseResult<&str> {
    name.to_str()
        .ok_or_else(|| FuseError::InvalidName(name.to_string_lossy().into_owned()))
}

/// One `readdir` reply entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DirListingEntry {
    ino: u64,
    /// Position of the entry; the kernel passes it back to continue.
    offset: i64,
    kind: FileType,
    name: String,
}

/// FUSE adapter for a path-addressed filesystem.
pub struct FuseBridge<F> {
    /// The filesystem serving requests.
    fs: F,
    /// Inode table for path/inode mapping.
    inodes: InodeTable,
    /// TTLs and reported ownership.
    config: MountConfig,
}

impl<F: PathFilesystem> FuseBridge<F> {
    pub fn new(fs: F, config: MountConfig) -> Self {
        info!(
            uid = config.uid,
            gid = config.gid,
            attr_ttl = ?config.attr_ttl,
            entry_ttl = ?config.entry_ttl,
            "FuseBridge initialized"
        );

        Self {
            fs,
            inodes: InodeTable::new(),
            config,
        }
    }

    /// The wrapped filesystem.
    pub fn inner(&self) -> &F {
        &self.fs
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    /// Converts synthesized attributes into a kernel `FileAttr`.
    pub fn make_attr(&self, ino: u64, attr: &SyntheticAttributes) -> FileAttr {
        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.blocks(),
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
            crtime: attr.mtime,
            kind: file_type(attr.kind),
            perm: attr.perm,
            nlink: attr.nlink,
            uid: self.config.uid,
            gid: self.config.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Path an inode was looked up under.
    fn path_of(&self, ino: u64) -> FuseResult<String> {
        self.inodes.path(ino).ok_or(FuseError::InvalidInode(ino))
    }

    /// Path of `name` inside directory `parent`.
    fn child_path(&self, parent: u64, name: &OsStr) -> FuseResult<String> {
        let name = name_str(name)?;
        let parent_path = self.path_of(parent)?;
        Ok(join_path(&parent_path, name))
    }

    /// Resolves `path` to attributes and registers it as a kernel reference.
    fn lookup_path(&self, path: &str) -> FuseResult<FileAttr> {
        let attr = self.fs.getattr(Some(path))?;
        let ino = self.inodes.get_or_insert(path);
        Ok(self.make_attr(ino, &attr))
    }

    fn do_getattr(&self, ino: u64) -> FuseResult<FileAttr> {
        // An unknown inode has no path; the filesystem decides what that means
        let path = self.inodes.path(ino);
        let attr = self.fs.getattr(path.as_deref())?;
        Ok(self.make_attr(ino, &attr))
    }

    /// Applies `setattr` fields in libfuse's order: mode, owner, size, times.
    fn do_setattr(
        &self,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
    ) -> FuseResult<FileAttr> {
        let path = self.path_of(ino)?;

        if let Some(mode) = mode {
            self.fs.chmod(&path, mode)?;
        }
        if uid.is_some() || gid.is_some() {
            self.fs.chown(&path, uid, gid)?;
        }
        if let Some(size) = size {
            self.fs.truncate(&path, size)?;
        }
        if atime.is_some() || mtime.is_some() {
            self.fs
                .utimens(&path, atime.map(time_spec), mtime.map(time_spec))?;
        }

        self.do_getattr(ino)
    }

    fn do_create(&self, parent: u64, name: &OsStr, mode: u32) -> FuseResult<FileAttr> {
        let path = self.child_path(parent, name)?;
        self.fs.create(&path, mode)?;
        self.lookup_path(&path)
    }

    fn do_rename(
        &self,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
    ) -> FuseResult<()> {
        let from = self.child_path(parent, name)?;
        let to = self.child_path(newparent, newname)?;
        self.fs.rename(&from, &to)?;
        Ok(())
    }

    /// Inode reported for `..` of `path`.
    fn parent_inode(&self, path: &str) -> u64 {
        parent_path(path)
            .and_then(|parent| self.inodes.get_inode(parent))
            .unwrap_or(ROOT_INODE)
    }

    /// Entries of directory `ino` that come after `offset`.
    ///
    /// Offsets handed back to the kernel are 1-based positions, so passing
    /// an entry's offset resumes the listing right after it.
    fn dir_entries(&self, ino: u64, offset: i64) -> FuseResult<Vec<DirListingEntry>> {
        let path = self.path_of(ino)?;
        let parent_ino = self.parent_inode(&path);

        let mut entries = Vec::new();
        let mut position: i64 = 0;
        self.fs
            .readdir(&path, &mut |name: &str| {
                position += 1;
                if position <= offset {
                    return false;
                }

                let (entry_ino, kind) = match name {
                    "." => (ino, FileType::Directory),
                    ".." => (parent_ino, FileType::Directory),
                    _ => {
                        let child = join_path(&path, name);
                        let entry_ino = self.inodes.get_inode(&child).unwrap_or(UNKNOWN_INO);
                        (entry_ino, file_type(classify(&child)))
                    }
                };
                entries.push(DirListingEntry {
                    ino: entry_ino,
                    offset: position,
                    kind,
                    name: name.to_string(),
                });
                false
            })
            .map_err(FuseError::from)?;

        Ok(entries)
    }
}

impl<F: PathFilesystem + 'static> Filesystem for FuseBridge<F> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("FUSE filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!(inodes = self.inodes.len(), "FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent = parent, name = ?name, "lookup");

        match self
            .child_path(parent, name)
            .and_then(|path| self.lookup_path(&path))
        {
            Ok(attr) => reply.entry(&self.config.entry_ttl, &attr, 0),
            Err(e) => {
                debug!(parent = parent, name = ?name, error = %e, "lookup failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(inode = ino, nlookup = nlookup, "forget");
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");

        match self.do_getattr(ino) {
            Ok(attr) => reply.attr(&self.config.attr_ttl, &attr),
            Err(e) => {
                debug!(inode = ino, error = %e, "getattr failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(
            inode = ino,
            mode = ?mode,
            uid = ?uid,
            gid = ?gid,
            size = ?size,
            "setattr"
        );

        match self.do_setattr(ino, mode, uid, gid, size, atime, mtime) {
            Ok(attr) => reply.attr(&self.config.attr_ttl, &attr),
            Err(e) => {
                debug!(inode = ino, error = %e, "setattr failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, flags = flags, "open");

        let result = self
            .path_of(ino)
            .and_then(|path| self.fs.open(&path, flags).map_err(FuseError::from));
        match result {
            // No per-open state, so every open shares handle 0
            Ok(()) => reply.opened(0, 0),
            Err(e) => {
                debug!(inode = ino, error = %e, "open failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, fh = fh, offset = offset, size = size, "read");

        let result = self
            .path_of(ino)
            .and_then(|path| self.fs.read(&path, size, offset).map_err(FuseError::from));
        match result {
            Ok(data) => reply.data(&data),
            Err(e) => {
                debug!(inode = ino, error = %e, "read failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(
            inode = ino,
            fh = fh,
            offset = offset,
            len = data.len(),
            "write"
        );

        let result = self
            .path_of(ino)
            .and_then(|path| self.fs.write(&path, data, offset).map_err(FuseError::from));
        match result {
            Ok(written) => match u32::try_from(written) {
                Ok(written) => reply.written(written),
                Err(_) => reply.error(libc::EINVAL),
            },
            Err(e) => {
                debug!(inode = ino, error = %e, "write failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset = offset, "readdir");

        match self.dir_entries(ino, offset) {
            Ok(entries) => {
                for entry in entries {
                    // add() returns true once the reply buffer is full
                    if reply.add(entry.ino, entry.offset, entry.kind, &entry.name) {
                        break;
                    }
                }
                reply.ok();
            }
            Err(e) => {
                debug!(inode = ino, error = %e, "readdir failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        // Nothing is stored, so there is no capacity to report
        reply.statfs(0, 0, 0, 0, 0, BLOCK_SIZE, NAME_MAX, BLOCK_SIZE);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        trace!(parent = parent, name = ?name, mode = mode, "create");

        match self.do_create(parent, name, mode) {
            Ok(attr) => reply.created(&self.config.entry_ttl, &attr, 0, 0, 0),
            Err(e) => {
                debug!(parent = parent, name = ?name, error = %e, "create failed");
                reply.error(e.to_errno());
            }
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent = parent, name = ?name, "unlink");

        let result = self
            .child_path(parent, name)
            .and_then(|path| self.fs.unlink(&path).map_err(FuseError::from));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent = parent, name = ?name, "rmdir");

        let result = self
            .child_path(parent, name)
            .and_then(|path| self.fs.rmdir(&path).map_err(FuseError::from));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        trace!(
            parent = parent,
            name = ?name,
            newparent = newparent,
            newname = ?newname,
            "rename"
        );

        match self.do_rename(parent, name, newparent, newname) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullfs_core::{FsError, NullFs, StartTime};
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    use std::time::{Duration, UNIX_EPOCH};

    fn bridge() -> FuseBridge<NullFs> {
        let started = StartTime::at(UNIX_EPOCH + Duration::from_secs(3_600));
        FuseBridge::new(
            NullFs::with_start_time(started),
            MountConfig::default().uid(1234).gid(5678),
        )
    }

    fn lookup(fs: &FuseBridge<NullFs>, parent: u64, name: &str) -> FuseResult<FileAttr> {
        let path = fs.child_path(parent, OsStr::new(name))?;
        fs.lookup_path(&path)
    }

    #[test]
    fn test_root_getattr() {
        let fs = bridge();
        let attr = fs.do_getattr(ROOT_INODE).unwrap();
        assert_eq!(attr.ino, ROOT_INODE);
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.nlink, 2);
        assert_eq!(attr.perm, 0o777);
        assert_eq!(attr.size, 0);
        assert_eq!(attr.uid, 1234);
        assert_eq!(attr.gid, 5678);
        assert_eq!(attr.mtime, UNIX_EPOCH + Duration::from_secs(3_600));
    }

    #[test]
    fn test_lookup_any_name_is_a_file() {
        let fs = bridge();
        let attr = lookup(&fs, ROOT_INODE, "anything.txt").unwrap();
        assert!(attr.ino > ROOT_INODE);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm, 0o666);
        assert_eq!(attr.nlink, 1);
        assert_eq!(fs.inodes().path(attr.ino).as_deref(), Some("/anything.txt"));
    }

    #[test]
    fn test_lookup_registers_reference() {
        let fs = bridge();
        let a = lookup(&fs, ROOT_INODE, "foo").unwrap();
        let b = lookup(&fs, ROOT_INODE, "foo").unwrap();
        assert_eq!(a.ino, b.ino);
        assert_eq!(fs.inodes().nlookup(a.ino), Some(2));
    }

    fn listing(entries: &[DirListingEntry]) -> Vec<(u64, i64, FileType, &str)> {
        entries
            .iter()
            .map(|e| (e.ino, e.offset, e.kind, e.name.as_str()))
            .collect()
    }

    #[test]
    fn test_dir_entries_of_root() {
        let fs = bridge();
        let entries = fs.dir_entries(ROOT_INODE, 0).unwrap();
        assert_eq!(
            listing(&entries),
            vec![
                (1, 1, FileType::Directory, "."),
                (1, 2, FileType::Directory, ".."),
            ]
        );
    }

    #[test]
    fn test_dir_entries_resume_after_offset() {
        let fs = bridge();
        let entries = fs.dir_entries(ROOT_INODE, 1).unwrap();
        assert_eq!(listing(&entries), vec![(1, 2, FileType::Directory, "..")]);

        assert!(fs.dir_entries(ROOT_INODE, 2).unwrap().is_empty());
        assert!(fs.dir_entries(ROOT_INODE, 10).unwrap().is_empty());
    }

    #[test]
    fn test_dir_entries_of_file_is_enoent() {
        let fs = bridge();
        let attr = lookup(&fs, ROOT_INODE, "foo").unwrap();
        let err = fs.dir_entries(attr.ino, 0).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_dir_entries_of_unknown_inode() {
        let fs = bridge();
        let err = fs.dir_entries(4242, 0).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_lookup_under_unknown_parent() {
        let fs = bridge();
        let err = lookup(&fs, 4242, "foo").unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_non_utf8_name_rejected() {
        let fs = bridge();
        let name = OsString::from_vec(vec![0x66, 0x6f, 0xff]);
        let err = fs.child_path(ROOT_INODE, &name).unwrap_err();
        assert!(matches!(err, FuseError::InvalidName(_)));
        assert_eq!(err.to_errno(), libc::EINVAL);
    }

    #[test]
    fn test_getattr_unknown_inode_is_enoent() {
        let fs = bridge();
        let err = fs.do_getattr(999).unwrap_err();
        assert!(matches!(err, FuseError::Fs(FsError::MissingPath)));
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_setattr_changes_nothing() {
        let fs = bridge();
        let ino = lookup(&fs, ROOT_INODE, "foo").unwrap().ino;

        let attr = fs
            .do_setattr(
                ino,
                Some(0o100600),
                Some(0),
                Some(0),
                Some(1 << 20),
                Some(TimeOrNow::Now),
                Some(TimeOrNow::SpecificTime(UNIX_EPOCH)),
            )
            .unwrap();

        assert_eq!(attr.ino, ino);
        assert_eq!(attr.size, 0);
        assert_eq!(attr.perm, 0o666);
        assert_eq!(attr.uid, 1234);
        assert!(attr.mtime > UNIX_EPOCH);
    }

    #[test]
    fn test_setattr_unknown_inode() {
        let fs = bridge();
        let err = fs
            .do_setattr(999, Some(0o644), None, None, None, None, None)
            .unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_create_returns_file_entry() {
        let fs = bridge();
        let attr = fs.do_create(ROOT_INODE, OsStr::new("new"), 0o100644).unwrap();
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.size, 0);
        assert_eq!(fs.inodes().get_inode("/new"), Some(attr.ino));
    }

    #[test]
    fn test_rename_leaves_table_alone() {
        let fs = bridge();
        let ino = lookup(&fs, ROOT_INODE, "a").unwrap().ino;
        fs.do_rename(ROOT_INODE, OsStr::new("a"), ROOT_INODE, OsStr::new("b"))
            .unwrap();

        assert_eq!(fs.inodes().get_inode("/a"), Some(ino));
        assert_eq!(fs.inodes().get_inode("/b"), None);
        assert_eq!(fs.do_getattr(ino).unwrap().kind, FileType::RegularFile);
    }

    #[test]
    fn test_parent_inode_falls_back_to_root() {
        let fs = bridge();
        assert_eq!(fs.parent_inode("/"), ROOT_INODE);
        assert_eq!(fs.parent_inode("/a/b/"), ROOT_INODE);
    }

    #[test]
    fn test_time_spec_conversion() {
        assert_eq!(time_spec(TimeOrNow::Now), TimeSpec::Now);
        assert_eq!(
            time_spec(TimeOrNow::SpecificTime(UNIX_EPOCH)),
            TimeSpec::At(UNIX_EPOCH)
        );
    }

    #[test]
    fn test_make_attr_fields() {
        let fs = bridge();
        let synthetic = fs.inner().getattr(Some("/foo")).unwrap();
        let attr = fs.make_attr(77, &synthetic);
        assert_eq!(attr.ino, 77);
        assert_eq!(attr.blocks, 0);
        assert_eq!(attr.blksize, BLOCK_SIZE);
        assert_eq!(attr.crtime, synthetic.mtime);
        assert_eq!(attr.rdev, 0);
    }
}
