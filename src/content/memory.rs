//! In-memory content store.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::content::error::{ContentError, ContentResult};
use crate::content::ContentStore;
use crate::model::ContentPath;

/// A content store backed by a hash map.
///
/// Failures can be injected per path suffix (for example a section file
/// name) to exercise the engine's strict-write and lenient-read handling.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<ContentPath, String>>,
    failing_writes: RwLock<Vec<String>>,
    failing_reads: RwLock<Vec<String>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` to a path ending in `suffix` fail.
    pub fn fail_writes_ending_with(&self, suffix: impl Into<String>) {
        self.failing_writes.write().push(suffix.into());
    }

    /// Make every `get` of a path ending in `suffix` fail.
    pub fn fail_reads_ending_with(&self, suffix: impl Into<String>) {
        self.failing_reads.write().push(suffix.into());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.failing_writes.write().clear();
        self.failing_reads.write().clear();
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Whether anything is stored at `path`.
    pub fn contains(&self, path: &ContentPath) -> bool {
        self.blobs.read().contains_key(path)
    }

    fn injected(rules: &RwLock<Vec<String>>, path: &ContentPath) -> bool {
        rules.read().iter().any(|suffix| path.as_str().ends_with(suffix.as_str()))
    }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, path: &ContentPath, text: &str) -> ContentResult<()> {
        if Self::injected(&self.failing_writes, path) {
            return Err(ContentError::unavailable(path, "injected write failure"));
        }
        self.blobs.write().insert(path.clone(), text.to_string());
        Ok(())
    }

    fn get(&self, path: &ContentPath) -> ContentResult<Option<String>> {
        if Self::injected(&self.failing_reads, path) {
            return Err(ContentError::unavailable(path, "injected read failure"));
        }
        Ok(self.blobs.read().get(path).cloned())
    }
}
