//! Core of a null flat filesystem.
//!
//! Every path resolves to one of two synthetic entities, decided only from the
//! shape of the path string:
//!
//! - an always-empty directory (paths ending in `/`, `/.` or `/..`, and the
//!   bare `.` and `..`)
//! - an always-empty regular file that accepts and discards writes
//!   (everything else)
//!
//! Nothing is stored. Creating, removing, renaming or changing metadata of an
//! entry succeeds and has no observable effect.
//!
//! # Usage
//!
//! ```
//! use nullfs_core::{NullFs, PathFilesystem, PathKind};
//!
//! let fs = NullFs::new();
//! assert_eq!(fs.getattr(Some("/foo")).unwrap().kind, PathKind::File);
//! assert_eq!(fs.write("/foo", b"hello", 0).unwrap(), 5);
//! assert!(fs.read("/foo", 10, 0).unwrap().is_empty());
//! assert!(fs.open("/bar/", 0).is_err());
//! ```

pub mod attr;
pub mod classify;
pub mod error;
pub mod ops;

pub use attr::{synthesize, StartTime, SyntheticAttributes, DIR_PERM, FILE_PERM};
pub use classify::{classify, PathKind};
pub use error::{FsError, FsResult};
pub use ops::{NullFs, PathFilesystem, TimeSpec, DIRECTORY_ENTRIES};
