//! Mounts a null filesystem on a scratch directory for one test.

use fuser::{BackgroundSession, MountOption};
use nullfs_core::NullFs;
use nullfs_fuse::{FuseBridge, MountConfig};
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const READY_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL: Duration = Duration::from_millis(50);

/// A live mount. Dropping it unmounts the filesystem, then removes the
/// scratch directory.
pub struct NullMount {
    _session: BackgroundSession,
    pub root: PathBuf,
    _scratch: TempDir,
}

impl NullMount {
    /// Mounts with zero cache TTLs so every stat reaches the bridge.
    pub fn mount() -> Result<Self, String> {
        let scratch = TempDir::new().map_err(|e| format!("scratch dir: {e}"))?;
        let root = scratch.path().join("null");
        fs::create_dir(&root).map_err(|e| format!("mountpoint: {e}"))?;

        let config = MountConfig::default()
            .attr_ttl(Duration::ZERO)
            .entry_ttl(Duration::ZERO);
        let options = [
            MountOption::FSName("nullfs-test".to_string()),
            MountOption::AutoUnmount,
        ];
        let session = fuser::spawn_mount2(FuseBridge::new(NullFs::new(), config), &root, &options)
            .map_err(|e| format!("mount: {e}"))?;

        await_mounted(&root)?;
        Ok(Self {
            _session: session,
            root,
            _scratch: scratch,
        })
    }

    /// Absolute path of `name` under the mount.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Names `read_dir` reports for `name`. It never yields `.` or `..`.
    pub fn names(&self, name: &str) -> io::Result<Vec<String>> {
        fs::read_dir(self.path(name))?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect()
    }
}

/// The mountpoint changes device once the kernel has attached the filesystem.
fn await_mounted(root: &Path) -> Result<(), String> {
    let outer = root
        .parent()
        .and_then(|p| fs::metadata(p).ok())
        .map(|m| m.dev())
        .ok_or("cannot stat mountpoint parent")?;

    let deadline = Instant::now() + READY_TIMEOUT;
    loop {
        if fs::metadata(root).is_ok_and(|m| m.dev() != outer) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(format!("{} never became a mount", root.display()));
        }
        thread::sleep(READY_POLL);
    }
}

pub fn fuse_present() -> bool {
    if cfg!(target_os = "macos") {
        Path::new("/Library/Filesystems/macfuse.fs").exists()
    } else {
        Path::new("/dev/fuse").exists()
    }
}

/// Mounts a [`NullMount`], or returns from the test when this machine
/// cannot mount FUSE filesystems.
#[macro_export]
macro_rules! mount_or_skip {
    () => {{
        if !$crate::common::harness::fuse_present() {
            eprintln!("skipping: no FUSE device");
            return;
        }
        match $crate::common::harness::NullMount::mount() {
            Ok(mount) => mount,
            Err(e) => {
                eprintln!("skipping: {e}");
                return;
            }
        }
    }};
}
