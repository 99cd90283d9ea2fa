//! Version repository: persistent rows for predictions and reviewed versions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   VersionRepository                         │
//! │     (prediction rows, version rows, approval lookups)       │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//!  ┌───────────────────────────┐   ┌───────────────────────────┐
//!  │  MemoryVersionRepository  │   │   GitVersionRepository    │
//!  │    (maps under a lock)    │   │ (row documents on main)   │
//!  └───────────────────────────┘   └───────────────────────────┘
//! ```
//!
//! Every single operation is atomic, including the approval check that
//! goes with writing an approved row: an implementation must reject the
//! write with `ApprovalConflict` in the same step that would commit it.
//! That check is what holds across processes sharing a Git store; the
//! approval coordinator's in-process locks only keep local writers from
//! racing up to it.

mod error;
mod git;
mod memory;

pub use error::{RepositoryError, RepositoryResult};
pub use git::GitVersionRepository;
pub use memory::MemoryVersionRepository;

use chrono::{DateTime, Utc};

use crate::model::{PredictionId, PredictionRecord, PredictionStatus, ReviewedVersion, VersionId};

/// Persistent storage for prediction and reviewed-version rows.
pub trait VersionRepository: Send + Sync {
    /// Record a new prediction (the upstream service's side of the contract).
    fn insert_prediction(&self, record: &PredictionRecord) -> RepositoryResult<()>;

    /// Fetch a prediction row.
    fn get_prediction(&self, id: &PredictionId) -> RepositoryResult<Option<PredictionRecord>>;

    /// Move a prediction to a new lifecycle state.
    ///
    /// Fails with `InvalidTransition` for `done -> in_progress`.
    fn update_prediction_status(
        &self,
        id: &PredictionId,
        status: PredictionStatus,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<PredictionRecord>;

    /// Lifecycle state of a prediction; `None` if it doesn't exist.
    fn get_prediction_status(&self, id: &PredictionId) -> RepositoryResult<Option<PredictionStatus>> {
        Ok(self.get_prediction(id)?.map(|record| record.status))
    }

    /// Insert a version row. Rejects duplicate IDs and unknown predictions.
    ///
    /// An approved row fails with `ApprovalConflict` when another version
    /// of the prediction is approved.
    fn insert_version(&self, row: &ReviewedVersion) -> RepositoryResult<()>;

    /// Fetch a version row.
    fn get_version(&self, id: &VersionId) -> RepositoryResult<Option<ReviewedVersion>>;

    /// All versions of a prediction, newest first.
    fn list_versions_by_prediction(&self, prediction_id: &PredictionId) -> RepositoryResult<Vec<ReviewedVersion>>;

    /// Set a version's approval flag and update timestamp.
    ///
    /// Approving fails with `ApprovalConflict` when another version of the
    /// prediction is approved.
    fn update_approval(
        &self,
        id: &VersionId,
        approved: bool,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<ReviewedVersion>;

    /// The approved version of a prediction other than `exclude`, if any.
    fn find_approved_version(
        &self,
        prediction_id: &PredictionId,
        exclude: Option<&VersionId>,
    ) -> RepositoryResult<Option<ReviewedVersion>> {
        Ok(self
            .list_versions_by_prediction(prediction_id)?
            .into_iter()
            .find(|version| version.is_approved && Some(&version.id) != exclude))
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every repository implementation must share.

    use super::*;
    use crate::model::Sections;
    use chrono::Duration;

    pub fn prediction(id: &str, status: PredictionStatus) -> PredictionRecord {
        PredictionRecord::new(PredictionId::new(id).unwrap(), "acme", "model-1").with_status(status)
    }

    pub fn version(id: &str, prediction: &str, approved: bool, created_at: DateTime<Utc>) -> ReviewedVersion {
        ReviewedVersion {
            id: VersionId::new(id).unwrap(),
            prediction_id: PredictionId::new(prediction).unwrap(),
            model_version: "model-1".to_string(),
            is_approved: approved,
            created_at,
            updated_at: created_at,
            content_paths: Sections::default(),
        }
    }

    pub fn prediction_round_trip(repo: &dyn VersionRepository) {
        let record = prediction("p1", PredictionStatus::InProgress);
        repo.insert_prediction(&record).unwrap();

        assert_eq!(repo.get_prediction(&record.id).unwrap(), Some(record.clone()));
        assert_eq!(
            repo.get_prediction_status(&record.id).unwrap(),
            Some(PredictionStatus::InProgress)
        );

        let dup = repo.insert_prediction(&record);
        assert!(matches!(dup, Err(RepositoryError::DuplicatePrediction(_))));

        let later = record.updated_at + Duration::seconds(1);
        let done = repo
            .update_prediction_status(&record.id, PredictionStatus::Done, later)
            .unwrap();
        assert_eq!(done.status, PredictionStatus::Done);
        assert_eq!(done.updated_at, later);
        assert_eq!(repo.get_prediction_status(&record.id).unwrap(), Some(PredictionStatus::Done));

        let again = repo
            .update_prediction_status(&record.id, PredictionStatus::Done, later)
            .unwrap();
        assert_eq!(again.status, PredictionStatus::Done);
        assert!(matches!(
            repo.update_prediction_status(&record.id, PredictionStatus::InProgress, later),
            Err(RepositoryError::InvalidTransition {
                from: PredictionStatus::Done,
                to: PredictionStatus::InProgress,
                ..
            })
        ));
        assert_eq!(repo.get_prediction_status(&record.id).unwrap(), Some(PredictionStatus::Done));

        let ghost = PredictionId::new("ghost").unwrap();
        assert_eq!(repo.get_prediction_status(&ghost).unwrap(), None);
        assert!(matches!(
            repo.update_prediction_status(&ghost, PredictionStatus::Done, later),
            Err(RepositoryError::PredictionMissing(_))
        ));
    }

    pub fn version_rows(repo: &dyn VersionRepository) {
        repo.insert_prediction(&prediction("p1", PredictionStatus::Done)).unwrap();
        repo.insert_prediction(&prediction("p2", PredictionStatus::Done)).unwrap();

        let t0 = Utc::now();
        let v1 = version("v1", "p1", false, t0);
        let v2 = version("v2", "p1", true, t0 + Duration::seconds(1));
        let v3 = version("v3", "p2", false, t0);
        for row in [&v1, &v2, &v3] {
            repo.insert_version(row).unwrap();
        }

        assert_eq!(repo.get_version(&v1.id).unwrap(), Some(v1.clone()));
        assert_eq!(repo.get_version(&VersionId::new("nope").unwrap()).unwrap(), None);

        let listed: Vec<VersionId> = repo
            .list_versions_by_prediction(&v1.prediction_id)
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(listed, vec![v2.id.clone(), v1.id.clone()]);

        let none = repo
            .list_versions_by_prediction(&PredictionId::new("p3").unwrap())
            .unwrap();
        assert!(none.is_empty());

        assert!(matches!(
            repo.insert_version(&v1),
            Err(RepositoryError::DuplicateVersion(_))
        ));
        assert!(matches!(
            repo.insert_version(&version("v9", "missing", false, t0)),
            Err(RepositoryError::PredictionMissing(_))
        ));
    }

    pub fn approval_lookup(repo: &dyn VersionRepository) {
        repo.insert_prediction(&prediction("p1", PredictionStatus::Done)).unwrap();
        let t0 = Utc::now();
        let v1 = version("v1", "p1", true, t0);
        let v2 = version("v2", "p1", false, t0 + Duration::seconds(1));
        repo.insert_version(&v1).unwrap();
        repo.insert_version(&v2).unwrap();

        let found = repo.find_approved_version(&v1.prediction_id, None).unwrap();
        assert_eq!(found.map(|v| v.id), Some(v1.id.clone()));
        assert_eq!(
            repo.find_approved_version(&v1.prediction_id, Some(&v1.id)).unwrap(),
            None
        );

        let later = t0 + Duration::seconds(5);
        let updated = repo.update_approval(&v1.id, false, later).unwrap();
        assert!(!updated.is_approved);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, v1.created_at);
        assert_eq!(updated.content_paths, v1.content_paths);
        assert_eq!(repo.find_approved_version(&v1.prediction_id, None).unwrap(), None);

        assert!(matches!(
            repo.update_approval(&VersionId::new("ghost").unwrap(), true, later),
            Err(RepositoryError::VersionMissing(_))
        ));
    }

    pub fn approval_exclusivity(repo: &dyn VersionRepository) {
        repo.insert_prediction(&prediction("p1", PredictionStatus::Done)).unwrap();
        repo.insert_prediction(&prediction("p2", PredictionStatus::Done)).unwrap();
        let t0 = Utc::now();
        let v1 = version("v1", "p1", true, t0);
        repo.insert_version(&v1).unwrap();

        let conflict = repo.insert_version(&version("v2", "p1", true, t0));
        match conflict {
            Err(RepositoryError::ApprovalConflict {
                prediction_id,
                approved_version_id,
            }) => {
                assert_eq!(prediction_id, v1.prediction_id);
                assert_eq!(approved_version_id, v1.id);
            }
            other => panic!("expected approval conflict, got {other:?}"),
        }
        assert_eq!(repo.get_version(&VersionId::new("v2").unwrap()).unwrap(), None);

        // drafts and other predictions are unaffected
        let v3 = version("v3", "p1", false, t0);
        repo.insert_version(&v3).unwrap();
        repo.insert_version(&version("v4", "p2", true, t0)).unwrap();

        assert!(matches!(
            repo.update_approval(&v3.id, true, t0),
            Err(RepositoryError::ApprovalConflict { .. })
        ));
        assert!(!repo.get_version(&v3.id).unwrap().unwrap().is_approved);

        // re-approving the holder is fine, and releasing it frees the slot
        assert!(repo.update_approval(&v1.id, true, t0).unwrap().is_approved);
        repo.update_approval(&v1.id, false, t0).unwrap();
        assert!(repo.update_approval(&v3.id, true, t0).unwrap().is_approved);
    }
}
