//! storage layer for the Git-backed stores
//!
//! this module provides a complete abstraction over git for persisting
//! documents. The Git implementations of the content store and the
//! version repository use this API and never touch git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GitRepository                           │
//! │     (High-level API: documents, rows, commits on main)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    tree     │       │    blob     │       │    refs     │
//!  │  (layout)   │       │ (documents) │       │   (main)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use review_engine::storage::{Document, GitRepository, TableName};
//!
//! let repo = GitRepository::open_or_init("./review-data")?;
//! let table = TableName::new("predictions")?;
//! repo.insert_row(&table, &Document::new("p1", body))?;
//! let row = repo.read_row(&table, "p1")?;
//! ```

mod blob;
mod commit;
mod error;
mod refs;
mod repository;
mod tree;
mod types;

pub use blob::Document;
pub use commit::{CommitInfo, CommitMessage};
pub use error::{StorageError, StorageResult};
pub use repository::{GitRepository, RowView};
pub use types::{BlobId, BranchName, CommitId, GitSignature, InvalidNameError, ObjectPath, RowPath, TableName, TreeId};
