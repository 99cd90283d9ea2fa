//! Git-backed content store.
//!
//! Each blob is a JSON document stored at its exact path in the tree of
//! `main`; every `put` is one commit. The document envelope carries the
//! path as its key, so a blob copied or moved to the wrong path is detected
//! on read.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::trace;

use crate::content::error::{ContentError, ContentResult};
use crate::content::ContentStore;
use crate::model::ContentPath;
use crate::storage::{Document, GitRepository};

const TEXT_FIELD: &str = "text";

/// A content store persisting blobs in a Git repository.
#[derive(Debug, Clone)]
pub struct GitContentStore {
    repo: GitRepository,
}

impl GitContentStore {
    /// Use an already opened repository.
    pub fn new(repo: GitRepository) -> Self {
        Self { repo }
    }

    /// Open the repository at `path`, creating it if missing.
    pub fn open_or_init(path: impl AsRef<Path>) -> ContentResult<Self> {
        Ok(Self::new(GitRepository::open_or_init(path)?))
    }

    /// The underlying repository.
    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }
}

impl ContentStore for GitContentStore {
    fn put(&self, path: &ContentPath, text: &str) -> ContentResult<()> {
        let mut body = Map::new();
        body.insert(TEXT_FIELD.to_string(), Value::String(text.to_string()));
        let doc = Document::new(path.as_str(), body);

        let commit = self.repo.put_document(path, &doc)?;
        trace!(path = %path, commit = %commit.short(), "stored content blob");
        Ok(())
    }

    fn get(&self, path: &ContentPath) -> ContentResult<Option<String>> {
        let Some(doc) = self.repo.read_document(path, path.as_str())? else {
            return Ok(None);
        };

        match doc.get(TEXT_FIELD) {
            Some(Value::String(text)) => Ok(Some(text.clone())),
            _ => Err(ContentError::Malformed {
                path: path.clone(),
                reason: format!("missing string field '{}'", TEXT_FIELD),
            }),
        }
    }
}
