//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;
use std::path::{Path, PathBuf};

use git2::Oid;
use serde::{Deserialize, Serialize};

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the storage module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git blob identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub(crate) Oid);

impl BlobId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, relative, slash-separated path inside the object tree.
///
/// Paths double as Git tree paths, so they are restricted to prevent
/// traversal and keep them portable:
/// - non-empty, at most 512 bytes
/// - no leading or trailing `/`, no empty components
/// - no `.` or `..` components
/// - only ASCII alphanumerics, `_`, `-`, `.` and `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    const MAX_LEN: usize = 512;

    /// create a new ObjectPath, validating the input
    pub fn new(path: impl Into<String>) -> Result<Self, InvalidNameError> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    fn validate(path: &str) -> Result<(), InvalidNameError> {
        if path.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if path.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(path.len()));
        }

        for (i, c) in path.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.' | '/') {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        if path
            .split('/')
            .any(|component| component.is_empty() || component == "." || component == "..")
        {
            return Err(InvalidNameError::InvalidPath(path.to_string()));
        }

        Ok(())
    }

    /// append a single component, validating the result
    pub fn join(&self, component: &str) -> Result<Self, InvalidNameError> {
        Self::new(format!("{}/{}", self.0, component))
    }

    /// the final component (file name)
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// view as a filesystem-style path (for git tree lookups)
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// convert to a PathBuf (for error reporting)
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> Self {
        path.0
    }
}

/// A validated table name.
///
/// Tables are top-level directories of the object tree. Names must be
/// 1-64 characters, start with a lowercase letter, and contain only
/// lowercase alphanumerics and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// create a new TableName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        let first_char = name.chars().next().ok_or(InvalidNameError::Empty)?;

        if name.len() > 64 {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        if !first_char.is_ascii_lowercase() {
            return Err(InvalidNameError::InvalidStart(first_char));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '_' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// the table directory as an object path
    pub fn as_object_path(&self) -> ObjectPath {
        // table names are a strict subset of valid object paths
        ObjectPath(self.0.clone())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full path to a row document in the repository.
///
/// Format: `{table}/{key}.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPath {
    pub table: TableName,
    pub key: String,
}

impl RowPath {
    /// create a new RowPath; the key must be a single valid path component
    pub fn new(table: TableName, key: impl Into<String>) -> Result<Self, InvalidNameError> {
        let key = key.into();
        if key.contains('/') {
            return Err(InvalidNameError::InvalidPath(key));
        }
        // validates the key characters as a side effect
        ObjectPath::new(format!("{}/{}.json", table, key))?;
        Ok(Self { table, key })
    }

    /// the row document's object path
    pub fn to_object_path(&self) -> ObjectPath {
        ObjectPath(format!("{}/{}.json", self.table, self.key))
    }
}

impl fmt::Display for RowPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.json", self.table, self.key)
    }
}

/// a branch name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    /// the main branch name
    pub const MAIN: &'static str = "main";

    /// create a new BranchName
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if name.contains("..") || name.ends_with('/') || name.starts_with('/') {
            return Err(InvalidNameError::InvalidPath(name));
        }
        Ok(Self(name))
    }

    /// create the main branch reference
    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// get the full ref path (e.g., "refs/heads/main")
    pub fn as_ref_path(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// get the short name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// default signature for engine-authored commits
    pub fn engine() -> Self {
        Self {
            name: "review-engine".to_string(),
            email: "review-engine@localhost".to_string(),
        }
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::engine()
    }
}

/// error type for invalid names (tables, paths, branches)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}
