//! Content store error types.

use thiserror::Error;

use crate::model::ContentPath;
use crate::storage::StorageError;

/// Result type for content store operations.
pub type ContentResult<T> = Result<T, ContentError>;

/// Errors a content store can report.
///
/// A missing blob is not an error: `get` returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Git storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The store could not serve the request right now.
    #[error("content store unavailable for {path}: {reason}")]
    Unavailable { path: ContentPath, reason: String },

    /// A stored object did not have the expected shape.
    #[error("malformed content at {path}: {reason}")]
    Malformed { path: ContentPath, reason: String },
}

impl ContentError {
    /// Check if retrying the same call might succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            ContentError::Storage(e) => e.is_retriable(),
            ContentError::Unavailable { .. } => true,
            ContentError::Malformed { .. } => false,
        }
    }

    pub(crate) fn unavailable(path: &ContentPath, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}
