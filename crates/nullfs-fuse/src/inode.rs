//! Inode management for the FUSE bridge.
//!
//! The kernel refers to entries by inode number and remembers each one until
//! it sends `forget`. This table maps those numbers back to the paths they
//! were looked up under. It says nothing about whether an entity exists;
//! that is always decided by the path itself.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// The root inode number (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// Path of the mount root.
pub const ROOT_PATH: &str = "/";

/// Joins a name onto a parent path with exactly one separator between them.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Returns the parent of `path`, or `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some(ROOT_PATH),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// An entry in the inode table.
#[derive(Debug)]
pub struct InodeEntry {
    /// The path the kernel looked this inode up under.
    pub path: String,
    /// Lookup count for proper `forget()` handling.
    nlookup: AtomicU64,
}

impl InodeEntry {
    pub fn new(path: String) -> Self {
        Self {
            path,
            nlookup: AtomicU64::new(1), // Initial lookup count is 1
        }
    }

    /// Increments the lookup count and returns the new value.
    pub fn inc_nlookup(&self) -> u64 {
        self.nlookup.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrements the lookup count by the given amount and returns the new value.
    /// Returns `None` if the count would go negative (shouldn't happen in normal operation).
    pub fn dec_nlookup(&self, count: u64) -> Option<u64> {
        let old = self.nlookup.fetch_sub(count, Ordering::SeqCst);
        if old < count {
            self.nlookup.fetch_add(count, Ordering::SeqCst);
            None
        } else {
            Some(old - count)
        }
    }

    pub fn nlookup(&self) -> u64 {
        self.nlookup.load(Ordering::SeqCst)
    }
}

/// Thread-safe bidirectional map between inode numbers and paths.
pub struct InodeTable {
    path_to_inode: DashMap<String, u64>,
    inode_to_entry: DashMap<u64, InodeEntry>,
    next_inode: AtomicU64,
}

impl InodeTable {
    /// Creates a table with the root pre-allocated.
    pub fn new() -> Self {
        let table = Self {
            path_to_inode: DashMap::new(),
            inode_to_entry: DashMap::new(),
            // Start at 2 since inode 1 is reserved for root
            next_inode: AtomicU64::new(ROOT_INODE + 1),
        };

        table.path_to_inode.insert(ROOT_PATH.to_string(), ROOT_INODE);
        table
            .inode_to_entry
            .insert(ROOT_INODE, InodeEntry::new(ROOT_PATH.to_string()));

        table
    }

    /// Returns the inode for `path`, allocating one if needed.
    ///
    /// Counts as one kernel lookup either way.
    pub fn get_or_insert(&self, path: &str) -> u64 {
        // Fast path: already known
        if let Some(inode) = self.path_to_inode.get(path) {
            let ino = *inode;
            drop(inode);
            if let Some(entry) = self.inode_to_entry.get(&ino) {
                entry.inc_nlookup();
                return ino;
            }
        }

        // Entry API avoids racing another allocation for the same path
        let mut allocated = false;
        let ino = *self
            .path_to_inode
            .entry(path.to_string())
            .or_insert_with(|| {
                allocated = true;
                let ino = self.next_inode.fetch_add(1, Ordering::SeqCst);
                self.inode_to_entry
                    .insert(ino, InodeEntry::new(path.to_string()));
                ino
            });

        if !allocated && let Some(entry) = self.inode_to_entry.get(&ino) {
            entry.inc_nlookup();
        }
        ino
    }

    /// Returns the path an inode was looked up under.
    pub fn path(&self, inode: u64) -> Option<String> {
        self.inode_to_entry.get(&inode).map(|e| e.path.clone())
    }

    /// Looks up an inode by path without counting a lookup.
    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(path).map(|r| *r)
    }

    /// Returns the current lookup count of an inode.
    pub fn nlookup(&self, inode: u64) -> Option<u64> {
        self.inode_to_entry.get(&inode).map(|e| e.nlookup())
    }

    /// Decrements the lookup count for an inode, evicting it at zero.
    /// Returns `true` if the inode was evicted.
    pub fn forget(&self, inode: u64, nlookup: u64) -> bool {
        if inode == ROOT_INODE {
            return false;
        }

        if let Some(entry) = self.inode_to_entry.get(&inode)
            && let Some(remaining) = entry.dec_nlookup(nlookup)
            && remaining == 0
        {
            drop(entry);
            return self.evict(inode);
        }
        false
    }

    fn evict(&self, inode: u64) -> bool {
        if let Some((_, entry)) = self.inode_to_entry.remove(&inode) {
            self.path_to_inode
                .remove_if(&entry.path, |_, mapped| *mapped == inode);
            true
        } else {
            false
        }
    }

    /// Returns the number of inodes currently in the table.
    pub fn len(&self) -> usize {
        self.inode_to_entry.len()
    }

    /// Returns true if the table only contains the root inode.
    pub fn is_empty(&self) -> bool {
        self.inode_to_entry.len() <= 1
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
