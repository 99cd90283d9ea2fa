//! Git-backed version repository.
//!
//! Rows are JSON documents in two tables of the repository tree:
//!
//! ```text
//! predictions/{prediction_id}.json
//! reviewed_versions/{version_id}.json
//! ```
//!
//! Each insert or update is one commit on `main`. The checks that go with
//! a write (the prediction exists, no other version is approved) read the
//! same tree the commit is built on, so they hold against writers in other
//! processes too.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::catalog::error::{RepositoryError, RepositoryResult};
use crate::catalog::VersionRepository;
use crate::model::{PredictionId, PredictionRecord, PredictionStatus, ReviewedVersion, VersionId};
use crate::storage::{Document, GitRepository, RowView, StorageError, TableName};

const PREDICTIONS: &str = "predictions";
const REVIEWED_VERSIONS: &str = "reviewed_versions";

/// A version repository persisting rows in a Git repository.
#[derive(Debug, Clone)]
pub struct GitVersionRepository {
    repo: GitRepository,
    predictions: TableName,
    versions: TableName,
}

impl GitVersionRepository {
    /// Top-level tree directories holding the row tables.
    pub const TABLES: [&'static str; 2] = [PREDICTIONS, REVIEWED_VERSIONS];

    /// Use an already opened repository.
    pub fn new(repo: GitRepository) -> RepositoryResult<Self> {
        Ok(Self {
            repo,
            predictions: TableName::new(PREDICTIONS).map_err(StorageError::from)?,
            versions: TableName::new(REVIEWED_VERSIONS).map_err(StorageError::from)?,
        })
    }

    /// Open the repository at `path`, creating it if missing.
    pub fn open_or_init(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        Self::new(GitRepository::open_or_init(path)?)
    }

    /// The underlying repository.
    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }

    fn read_version(&self, id: &VersionId) -> RepositoryResult<Option<ReviewedVersion>> {
        match self.repo.read_row(&self.versions, id.as_str())? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// fail with `ApprovalConflict` if a version other than `exclude` is
    /// approved in the viewed tree
    fn ensure_no_other_approved(
        &self,
        view: &RowView<'_, '_>,
        prediction_id: &PredictionId,
        exclude: &VersionId,
    ) -> RepositoryResult<()> {
        let versions = versions_of(view.scan_table(&self.versions)?, prediction_id)?;
        match versions.into_iter().find(|v| v.is_approved && &v.id != exclude) {
            Some(approved) => Err(RepositoryError::ApprovalConflict {
                prediction_id: prediction_id.clone(),
                approved_version_id: approved.id,
            }),
            None => Ok(()),
        }
    }
}

/// decode the rows belonging to one prediction, newest first
fn versions_of(docs: Vec<Document>, prediction_id: &PredictionId) -> RepositoryResult<Vec<ReviewedVersion>> {
    let mut versions = Vec::new();
    for doc in docs {
        let row: ReviewedVersion = doc.decode()?;
        if &row.prediction_id == prediction_id {
            versions.push(row);
        }
    }
    versions.sort_by(ReviewedVersion::newest_first);
    Ok(versions)
}

/// rewrite a document's body from a typed row
fn reencode<T: serde::Serialize>(doc: Document, row: &T) -> Result<Document, StorageError> {
    match serde_json::to_value(row)? {
        Value::Object(body) => Ok(doc.with_body(body)),
        _ => Err(StorageError::Internal("row must serialize to a JSON object".to_string())),
    }
}

impl VersionRepository for GitVersionRepository {
    fn insert_prediction(&self, record: &PredictionRecord) -> RepositoryResult<()> {
        let doc = Document::from_serializable(record.id.as_str(), record)?;
        match self.repo.insert_row(&self.predictions, &doc) {
            Ok(commit) => {
                debug!(prediction_id = %record.id, commit = %commit.short(), "inserted prediction row");
                Ok(())
            }
            Err(StorageError::RowAlreadyExists(_)) => Err(RepositoryError::DuplicatePrediction(record.id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn get_prediction(&self, id: &PredictionId) -> RepositoryResult<Option<PredictionRecord>> {
        match self.repo.read_row(&self.predictions, id.as_str())? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    fn update_prediction_status(
        &self,
        id: &PredictionId,
        status: PredictionStatus,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<PredictionRecord> {
        let result = self.repo.update_row(&self.predictions, id.as_str(), |_, doc| {
            let mut record: PredictionRecord = doc.decode()?;
            if !record.status.can_transition_to(status) {
                return Err(RepositoryError::InvalidTransition {
                    id: id.clone(),
                    from: record.status,
                    to: status,
                });
            }
            record.status = status;
            record.updated_at = updated_at;
            Ok(reencode(doc, &record)?)
        });

        match result {
            Ok(doc) => Ok(doc.decode()?),
            Err(RepositoryError::Storage(StorageError::RowNotFound(_))) => {
                Err(RepositoryError::PredictionMissing(id.clone()))
            }
            Err(e) => Err(e),
        }
    }

    fn insert_version(&self, row: &ReviewedVersion) -> RepositoryResult<()> {
        let doc = Document::from_serializable(row.id.as_str(), row)?;
        let result = self.repo.insert_row_where(&self.versions, &doc, |view| {
            if view.read_row(&self.predictions, row.prediction_id.as_str())?.is_none() {
                return Err(RepositoryError::PredictionMissing(row.prediction_id.clone()));
            }
            if row.is_approved {
                self.ensure_no_other_approved(view, &row.prediction_id, &row.id)?;
            }
            Ok(())
        });

        match result {
            Ok(commit) => {
                debug!(version_id = %row.id, commit = %commit.short(), "inserted version row");
                Ok(())
            }
            Err(RepositoryError::Storage(StorageError::RowAlreadyExists(_))) => {
                Err(RepositoryError::DuplicateVersion(row.id.clone()))
            }
            Err(e) => Err(e),
        }
    }

    fn get_version(&self, id: &VersionId) -> RepositoryResult<Option<ReviewedVersion>> {
        self.read_version(id)
    }

    fn list_versions_by_prediction(&self, prediction_id: &PredictionId) -> RepositoryResult<Vec<ReviewedVersion>> {
        versions_of(self.repo.scan_table(&self.versions)?, prediction_id)
    }

    fn update_approval(
        &self,
        id: &VersionId,
        approved: bool,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<ReviewedVersion> {
        let result = self.repo.update_row(&self.versions, id.as_str(), |view, doc| {
            let mut row: ReviewedVersion = doc.decode()?;
            if approved {
                self.ensure_no_other_approved(view, &row.prediction_id, id)?;
            }
            row.is_approved = approved;
            row.updated_at = updated_at;
            Ok(reencode(doc, &row)?)
        });

        match result {
            Ok(doc) => Ok(doc.decode()?),
            Err(RepositoryError::Storage(StorageError::RowNotFound(_))) => {
                Err(RepositoryError::VersionMissing(id.clone()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::contract;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitVersionRepository) {
        let dir = TempDir::new().unwrap();
        let repo = GitVersionRepository::open_or_init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_prediction_round_trip() {
        let (_dir, repo) = setup();
        contract::prediction_round_trip(&repo);
    }

    #[test]
    fn test_version_rows() {
        let (_dir, repo) = setup();
        contract::version_rows(&repo);
    }

    #[test]
    fn test_approval_lookup() {
        let (_dir, repo) = setup();
        contract::approval_lookup(&repo);
    }

    #[test]
    fn test_approval_exclusivity() {
        let (_dir, repo) = setup();
        contract::approval_exclusivity(&repo);
    }

    #[test]
    fn test_approval_checked_against_other_handles() {
        let dir = TempDir::new().unwrap();
        let first = GitVersionRepository::open_or_init(dir.path()).unwrap();
        let second = GitVersionRepository::open_or_init(dir.path()).unwrap();
        first.insert_prediction(&contract::prediction("p1", PredictionStatus::Done)).unwrap();

        let now = Utc::now();
        first.insert_version(&contract::version("v1", "p1", true, now)).unwrap();
        second.insert_version(&contract::version("v2", "p1", false, now)).unwrap();

        assert!(matches!(
            second.insert_version(&contract::version("v3", "p1", true, now)),
            Err(RepositoryError::ApprovalConflict { .. })
        ));
        assert!(matches!(
            second.update_approval(&VersionId::new("v2").unwrap(), true, now),
            Err(RepositoryError::ApprovalConflict { .. })
        ));
        let approved = first.find_approved_version(&PredictionId::new("p1").unwrap(), None).unwrap();
        assert_eq!(approved.map(|v| v.id.to_string()), Some("v1".to_string()));
    }

    #[test]
    fn test_done_prediction_cannot_reopen() {
        let (_dir, repo) = setup();
        let record = contract::prediction("p1", PredictionStatus::Done);
        repo.insert_prediction(&record).unwrap();

        let head = repo.repo().head().unwrap();
        let result = repo.update_prediction_status(&record.id, PredictionStatus::InProgress, Utc::now());
        assert!(matches!(result, Err(RepositoryError::InvalidTransition { .. })));
        assert_eq!(repo.repo().head().unwrap(), head);
    }

    #[test]
    fn test_rows_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let record = contract::prediction("p1", PredictionStatus::Done);
        let row = contract::version("v1", "p1", true, Utc::now());
        {
            let repo = GitVersionRepository::open_or_init(dir.path()).unwrap();
            repo.insert_prediction(&record).unwrap();
            repo.insert_version(&row).unwrap();
        }

        let repo = GitVersionRepository::open_or_init(dir.path()).unwrap();
        assert_eq!(repo.get_prediction(&record.id).unwrap(), Some(record));
        assert_eq!(repo.get_version(&row.id).unwrap(), Some(row));
    }

    #[test]
    fn test_approval_update_bumps_document_revision() {
        let (_dir, repo) = setup();
        repo.insert_prediction(&contract::prediction("p1", PredictionStatus::Done)).unwrap();
        let row = contract::version("v1", "p1", false, Utc::now());
        repo.insert_version(&row).unwrap();

        repo.update_approval(&row.id, true, Utc::now()).unwrap();

        let table = TableName::new(REVIEWED_VERSIONS).unwrap();
        let doc = repo.repo().read_row(&table, "v1").unwrap().unwrap();
        assert_eq!(doc.revision, 2);
        assert_eq!(doc.get("isApproved"), Some(&Value::Bool(true)));
    }
}
