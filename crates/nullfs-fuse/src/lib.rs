//! FUSE mount for the null flat filesystem.
//!
//! The kernel talks to FUSE filesystems in inode numbers; the null filesystem
//! only understands paths. This crate sits between the two: it keeps a table
//! of the names the kernel currently holds references to, rebuilds the path
//! for each request, and forwards it to a [`PathFilesystem`].
//!
//! # Usage
//!
//! ```ignore
//! use nullfs_fuse::{FuseBridge, MountConfig};
//! use nullfs_core::NullFs;
//!
//! let fs = FuseBridge::new(NullFs::new(), MountConfig::default());
//! let session = fuser::spawn_mount2(fs, mountpoint, &options)?;
//! ```
//!
//! [`PathFilesystem`]: nullfs_core::PathFilesystem

pub mod config;
pub mod error;
pub mod filesystem;
pub mod inode;
pub mod options;
pub mod session;

pub use config::MountConfig;
pub use error::{FuseError, FuseResult, ToErrno};
pub use filesystem::FuseBridge;
pub use inode::{InodeTable, ROOT_INODE};
pub use options::MountArgs;
pub use session::{join_session, wait_for_shutdown, Shutdown, SESSION_POLL_INTERVAL};
