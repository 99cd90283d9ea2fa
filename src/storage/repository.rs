//!   Core Git repository wrapper.
//!
//!  This is the central component of the storage layer. It wraps
//!  `git2::Repository` with thread-safe access and provides the document
//!  and row operations the Git-backed stores are built on.
//!
//! Every write is a single commit on `main`, created while the repository
//! lock is held and published by compare-and-swap on the branch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use git2::Repository;
use parking_lot::Mutex;
use tracing::debug;

use crate::storage::blob::{self, Document};
use crate::storage::commit::{self, CommitBuilder, CommitInfo, CommitMessage};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::tree::{TreeHandle, TreeMutator};
use crate::storage::types::{BranchName, CommitId, GitSignature, ObjectPath, RowPath, TableName};

/// The main Git repository wrapper.
///
/// Clone this to share across threads - it uses Arc internally.
/// `git2::Repository` is `Send` but not `Sync`, so all access goes
/// through one mutex.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    repo: Mutex<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitRepository {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;

        // fail early on a repository without a main branch
        RefManager::resolve_branch(&repo, &BranchName::main())?;

        Ok(Self::wrap(repo, path))
    }

    /// Initialize a new repository with an empty root commit on `main`.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;

        let signature = GitSignature::engine();
        let commit_id = commit::create_initial_commit(&repo, &signature)?;
        RefManager::init_main_branch(&repo, commit_id)?;

        debug!(path = %path.display(), "initialized repository");
        Ok(Self::wrap(repo, path))
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    fn wrap(repo: Repository, path: &Path) -> Self {
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                signature: GitSignature::engine(),
            }),
        }
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    /// Get the current HEAD commit (tip of main branch).
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(RefManager::head_commit)
    }

    /// Get information about a commit.
    pub fn get_commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// Run a read against the tree at the tip of `main`.
    pub fn read_at_head<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository, &TreeHandle<'_>) -> StorageResult<T>,
    {
        self.with_repo(|repo| {
            let head = RefManager::head_commit(repo)?;
            let tree = commit::get_tree_at_commit(repo, head)?;
            f(repo, &tree)
        })
    }

    /// Apply a set of tree changes as one commit on `main`.
    ///
    /// The closure sees the current tree and records changes on the mutator;
    /// returning an error aborts without committing. When no change is
    /// recorded the current head is returned unchanged.
    ///
    /// If `main` moves between reading the tree and publishing the commit
    /// (another process writing the same repository), the closure runs
    /// again against the new tree, up to [`COMMIT_ATTEMPTS`] times.
    pub fn commit_to_main<F, E>(&self, message: String, mut f: F) -> Result<CommitId, E>
    where
        F: FnMut(&Repository, &TreeHandle<'_>, &mut TreeMutator) -> Result<(), E>,
        E: From<StorageError>,
    {
        let guard = self.inner.repo.lock();
        let repo: &Repository = &guard;
        let main = BranchName::main();
        let mut attempt = 1;

        loop {
            let head = RefManager::head_commit(repo)?;
            let tree = commit::get_tree_at_commit(repo, head)?;

            let mut mutator = TreeMutator::new();
            f(repo, &tree, &mut mutator)?;
            if mutator.is_empty() {
                return Ok(head);
            }

            let new_tree_id = mutator.write(repo, &tree)?;
            let commit_id = CommitBuilder::new(repo)
                .tree(new_tree_id)
                .parent(head)
                .message(message.clone())
                .signature(self.inner.signature.clone())
                .commit()?;

            match RefManager::update_branch_if_unchanged(repo, &main, head, commit_id) {
                Ok(()) => return Ok(commit_id),
                Err(e) if e.is_retriable() && attempt < COMMIT_ATTEMPTS => {
                    debug!(attempt, message = %message, "main moved, rebuilding commit");
                    // the other writer may still hold the ref lock
                    thread::sleep(RETRY_BACKOFF * attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ==================== Document Operations ====================

    /// Read the document stored at a path, verifying its key.
    pub fn read_document(&self, path: &ObjectPath, expected_key: &str) -> StorageResult<Option<Document>> {
        self.read_at_head(|repo, tree| read_document_in(repo, tree, path, expected_key))
    }

    /// Write (create or replace) the document at a path.
    pub fn put_document(&self, path: &ObjectPath, doc: &Document) -> StorageResult<CommitId> {
        self.commit_to_main(CommitMessage::put_content(path.as_str()), |repo, _tree, mutator| {
            let blob_id = blob::write_blob(repo, doc)?;
            mutator.upsert_blob(path, blob_id);
            Ok(())
        })
    }

    // ==================== Row Operations ====================

    /// Read a row document from a table.
    pub fn read_row(&self, table: &TableName, key: &str) -> StorageResult<Option<Document>> {
        let row_path = RowPath::new(table.clone(), key)?;
        self.read_document(&row_path.to_object_path(), key)
    }

    /// Insert a new row document, keyed by `doc.key`.
    ///
    /// Fails with `RowAlreadyExists` if the key is taken.
    pub fn insert_row(&self, table: &TableName, doc: &Document) -> StorageResult<CommitId> {
        self.insert_row_where(table, doc, |_| Ok(()))
    }

    /// Insert a new row document if `check` passes.
    ///
    /// `check` reads the same tree the insert is committed on top of, so a
    /// passing check still holds when the row lands on `main`. Its error
    /// aborts the insert and is returned as is.
    pub fn insert_row_where<F, E>(&self, table: &TableName, doc: &Document, mut check: F) -> Result<CommitId, E>
    where
        F: FnMut(&RowView<'_, '_>) -> Result<(), E>,
        E: From<StorageError>,
    {
        let row_path = RowPath::new(table.clone(), doc.key.clone()).map_err(StorageError::from)?;
        let path = row_path.to_object_path();

        self.commit_to_main(CommitMessage::insert(table.as_str(), &doc.key), |repo, tree, mutator| {
            if tree.blob_exists(&path)? {
                return Err(StorageError::RowAlreadyExists(row_path.clone()).into());
            }
            check(&RowView { repo, tree })?;
            let blob_id = blob::write_blob(repo, doc)?;
            mutator.upsert_blob(&path, blob_id);
            Ok(())
        })
    }

    /// Atomically read, transform and rewrite an existing row.
    ///
    /// The transform also gets a view of the tree the rewrite is committed
    /// on, for checks against other rows. It may run more than once when
    /// another process moves `main` concurrently.
    ///
    /// Fails with `RowNotFound` if the row doesn't exist. Returns the
    /// rewritten document.
    pub fn update_row<F, E>(&self, table: &TableName, key: &str, mut f: F) -> Result<Document, E>
    where
        F: FnMut(&RowView<'_, '_>, Document) -> Result<Document, E>,
        E: From<StorageError>,
    {
        let row_path = RowPath::new(table.clone(), key).map_err(StorageError::from)?;
        let path = row_path.to_object_path();
        let mut updated = None;

        self.commit_to_main::<_, E>(CommitMessage::update(table.as_str(), key), |repo, tree, mutator| {
            let current = read_document_in(repo, tree, &path, key)?
                .ok_or_else(|| StorageError::RowNotFound(row_path.clone()))?;
            let next = f(&RowView { repo, tree }, current)?;
            if next.key != key {
                return Err(StorageError::Internal(format!(
                    "row update changed key from '{}' to '{}'",
                    key, next.key
                ))
                .into());
            }
            let blob_id = blob::write_blob(repo, &next)?;
            mutator.upsert_blob(&path, blob_id);
            updated = Some(next);
            Ok(())
        })?;

        updated.ok_or_else(|| StorageError::Internal("row update produced no document".to_string()).into())
    }

    /// Scan all rows in a table.
    ///
    /// Warning: This reads all rows into memory. A missing table scans empty.
    pub fn scan_table(&self, table: &TableName) -> StorageResult<Vec<Document>> {
        self.read_at_head(|repo, tree| RowView { repo, tree }.scan_table(table))
    }
}

/// Retries of one commit when `main` moves underneath it.
pub const COMMIT_ATTEMPTS: u32 = 8;

const RETRY_BACKOFF: Duration = Duration::from_millis(2);

/// Read access to the rows of one tree, handed to write checks.
pub struct RowView<'a, 'repo> {
    repo: &'a Repository,
    tree: &'a TreeHandle<'repo>,
}

impl RowView<'_, '_> {
    /// Read a row document from a table.
    pub fn read_row(&self, table: &TableName, key: &str) -> StorageResult<Option<Document>> {
        let row_path = RowPath::new(table.clone(), key)?;
        read_document_in(self.repo, self.tree, &row_path.to_object_path(), key)
    }

    /// All row documents of a table; a missing table scans empty.
    pub fn scan_table(&self, table: &TableName) -> StorageResult<Vec<Document>> {
        let dir = table.as_object_path();
        let names = self.tree.list_blob_names(self.repo, &dir)?;
        let mut rows = Vec::with_capacity(names.len());

        for name in names {
            let Some(key) = name.strip_suffix(".json") else {
                continue;
            };
            let path = dir.join(&name)?;
            if let Some(doc) = read_document_in(self.repo, self.tree, &path, key)? {
                rows.push(doc);
            }
        }

        Ok(rows)
    }
}

fn read_document_in(
    repo: &Repository,
    tree: &TreeHandle<'_>,
    path: &ObjectPath,
    expected_key: &str,
) -> StorageResult<Option<Document>> {
    let blob_id = match tree.get_blob_id(path)? {
        Some(id) => id,
        None => return Ok(None),
    };

    let bytes = blob::read_blob(repo, blob_id)?;
    blob::deserialize_document(&bytes, expected_key).map(Some)
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("path", &self.inner.path)
            .finish()
    }
}
