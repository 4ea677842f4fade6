//! Path classification.
//!
//! Every path handed to the filesystem is either a directory or a regular
//! file, decided purely from the shape of the string. This is a best-effort
//! syntactic classification, not directory resolution: nothing is looked up,
//! so `/a/` and `/b/` are both directories and `/a` is a file no matter what
//! the caller previously did with it. Redundant separators and names that
//! happen to end in `/.` or `/..` classify by suffix alone.

use std::fmt;

/// Path separator used by the host.
pub const SEPARATOR: char = '/';

/// The two kinds of entity a path can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// An always-empty directory.
    Directory,
    /// An always-empty regular file that discards writes.
    File,
}

impl PathKind {
    pub fn is_dir(self) -> bool {
        self == PathKind::Directory
    }

    pub fn is_file(self) -> bool {
        self == PathKind::File
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Directory => f.write_str("directory"),
            PathKind::File => f.write_str("file"),
        }
    }
}

/// Classifies a path by its suffix.
///
/// A path is a [`PathKind::Directory`] if it ends with a separator, ends with
/// `/.` or `/..`, or is exactly `.` or `..`. Everything else, including the
/// empty string, is a [`PathKind::File`].
pub fn classify(path: &str) -> PathKind {
    let is_dir = path.ends_with(SEPARATOR)
        || path.ends_with("/.")
        || path.ends_with("/..")
        || path == "."
        || path == "..";

    if is_dir {
        PathKind::Directory
    } else {
        PathKind::File
    }
}
