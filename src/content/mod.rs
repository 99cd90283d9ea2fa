//! Content store: named text blobs addressed by path.
//!
//! The engine persists section text through this contract and keeps only
//! the paths in its rows. Stores need no versioning, listing or deletion;
//! all history lives in the version rows.
//!
//! Two implementations ship with the crate:
//! - [`MemoryContentStore`] keeps blobs in a map and can inject failures
//! - [`GitContentStore`] keeps blobs as JSON documents in a Git repository

mod error;
mod git;
mod memory;

pub use error::{ContentError, ContentResult};
pub use git::GitContentStore;
pub use memory::MemoryContentStore;

use crate::model::ContentPath;

/// External blob storage addressed by path.
///
/// Implementations must be shareable across threads: the engine writes and
/// reads the sections of one version concurrently.
pub trait ContentStore: Send + Sync {
    /// Store `text` at `path`, replacing anything already there.
    fn put(&self, path: &ContentPath, text: &str) -> ContentResult<()>;

    /// Fetch the text at `path`; `Ok(None)` when nothing is stored there.
    fn get(&self, path: &ContentPath) -> ContentResult<Option<String>>;
}
