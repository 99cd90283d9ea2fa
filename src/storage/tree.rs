//! tree operations for the object layout.
//!
//! in Git, a tree is a directory. The engine lays objects out as:
//! - one top-level directory per table, holding `{key}.json` row documents
//! - arbitrary nested directories for content blobs
//!   (`{base}/{version}/{section}.json`)
//!
//! this module provides safe abstractions over Git's tree manipulation,
//! which is notoriously fiddly to get right.

use git2::build::TreeUpdateBuilder;
use git2::{FileMode, ObjectType, Repository, Tree};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, ObjectPath, TreeId};

/// A read only handle to a git tree at a specific commit
///
/// think of it as a snapshot - it won't change even if new commits are made.
#[derive(Debug)]
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    /// create a TreeHandle from a git2::Tree
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    /// get the tree ID
    pub fn id(&self) -> TreeId {
        TreeId::new(self.tree.id())
    }

    /// get the underlying git2::Tree (for internal use)
    pub(crate) fn inner(&self) -> &Tree<'repo> {
        &self.tree
    }

    /// get the blob ID stored at a path, if any
    ///
    /// a path that resolves to a directory is an error, not a miss
    pub fn get_blob_id(&self, path: &ObjectPath) -> StorageResult<Option<BlobId>> {
        let entry = match self.tree.get_path(path.as_path()) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Git(e)),
        };

        if entry.kind() != Some(ObjectType::Blob) {
            return Err(StorageError::UnexpectedEntryType {
                path: path.to_path_buf(),
                expected: "blob (file)".to_string(),
                found: format!("{:?}", entry.kind()),
            });
        }

        Ok(Some(BlobId::new(entry.id())))
    }

    /// check if a blob exists at a path
    pub fn blob_exists(&self, path: &ObjectPath) -> StorageResult<bool> {
        Ok(self.get_blob_id(path)?.is_some())
    }

    /// list the names of the blob entries directly inside a directory
    ///
    /// a missing directory lists as empty
    pub fn list_blob_names(&self, repo: &Repository, dir: &ObjectPath) -> StorageResult<Vec<String>> {
        let entry = match self.tree.get_path(dir.as_path()) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Git(e)),
        };

        if entry.kind() != Some(ObjectType::Tree) {
            return Err(StorageError::UnexpectedEntryType {
                path: dir.to_path_buf(),
                expected: "tree (directory)".to_string(),
                found: format!("{:?}", entry.kind()),
            });
        }

        let subtree = repo.find_tree(entry.id())?;
        let names = subtree
            .iter()
            .filter(|entry| entry.kind() == Some(ObjectType::Blob))
            .filter_map(|entry| entry.name().map(str::to_string))
            .collect();

        Ok(names)
    }
}

/// a mutable set of changes against a baseline tree
///
/// this adds up changes and produces a new tree when its final;
/// the baseline tree is not modified. Intermediate directories are
/// created as needed.
///
/// # Usage Pattern
///
/// ```ignore
/// let mut mutator = TreeMutator::new();
/// mutator.upsert_blob(&path, blob_id);
/// let new_tree_id = mutator.write(repo, &baseline)?;
/// ```
pub struct TreeMutator {
    builder: TreeUpdateBuilder,
    changes: usize,
}

impl TreeMutator {
    /// create an empty set of changes
    pub fn new() -> Self {
        Self {
            builder: TreeUpdateBuilder::new(),
            changes: 0,
        }
    }

    /// insert or replace the blob at a path
    pub fn upsert_blob(&mut self, path: &ObjectPath, blob_id: BlobId) {
        self.builder.upsert(path.as_str(), blob_id.raw(), FileMode::Blob);
        self.changes += 1;
    }

    /// remove the entry at a path
    pub fn remove(&mut self, path: &ObjectPath) {
        self.builder.remove(path.as_str());
        self.changes += 1;
    }

    /// number of recorded changes
    pub fn len(&self) -> usize {
        self.changes
    }

    /// true when no change has been recorded
    pub fn is_empty(&self) -> bool {
        self.changes == 0
    }

    /// apply all changes to the baseline and return the new root tree ID
    pub fn write(mut self, repo: &Repository, baseline: &TreeHandle<'_>) -> StorageResult<TreeId> {
        let oid = self.builder.create_updated(repo, baseline.inner())?;
        Ok(TreeId::new(oid))
    }
}

impl Default for TreeMutator {
    fn default() -> Self {
        Self::new()
    }
}

/// create the initial empty root tree
pub fn create_initial_tree(repo: &Repository) -> StorageResult<TreeId> {
    let builder = repo.treebuilder(None)?;
    Ok(TreeId::new(builder.write()?))
}
