//! Mount configuration for the FUSE bridge.

use std::time::Duration;

/// Default kernel cache TTL for attributes and lookups, matching libfuse.
pub const DEFAULT_TTL: Duration = Duration::from_secs(1);

/// Configuration options for the FUSE bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    /// How long the kernel may cache attributes returned by `getattr`.
    ///
    /// Default: 1 second.
    pub attr_ttl: Duration,

    /// How long the kernel may cache a name lookup.
    ///
    /// Default: 1 second.
    pub entry_ttl: Duration,

    /// Owner reported for every entry. Default: the mounting user.
    pub uid: u32,

    /// Group reported for every entry. Default: the mounting user's group.
    pub gid: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        // SAFETY: getuid/getgid have no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        Self {
            attr_ttl: DEFAULT_TTL,
            entry_ttl: DEFAULT_TTL,
            uid,
            gid,
        }
    }
}

impl MountConfig {
    /// Sets the cache TTL for attributes.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }

    /// Sets the cache TTL for name lookups.
    #[must_use]
    pub fn entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Sets the reported owner.
    #[must_use]
    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    /// Sets the reported group.
    #[must_use]
    pub fn gid(mut self, gid: u32) -> Self {
        self.gid = gid;
        self
    }
}
