//! Error types for the null filesystem.

use crate::classify::PathKind;
use thiserror::Error;

/// Errors returned by the operation table.
///
/// Both variants are the same condition from the host's point of view ("no
/// such entry"); they are kept apart so log lines can say why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// The host passed no path at all.
    #[error("No path supplied")]
    MissingPath,

    /// The operation does not apply to the kind the path classifies as.
    #[error("No such entry: '{path}' is a {kind}")]
    NotFound {
        /// The offending path.
        path: String,
        /// What the path classified as.
        kind: PathKind,
    },
}

impl FsError {
    pub(crate) fn not_found(path: &str, kind: PathKind) -> Self {
        FsError::NotFound {
            path: path.to_string(),
            kind,
        }
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;
