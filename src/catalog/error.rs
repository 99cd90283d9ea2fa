//! Version repository error types.

use thiserror::Error;

use crate::model::{PredictionId, PredictionStatus, VersionId};
use crate::storage::StorageError;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors a version repository can report.
///
/// Lookups of absent rows are not errors (`Ok(None)`); these variants cover
/// writes that reference missing or duplicate rows and backend failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Git storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A prediction with this ID already exists.
    #[error("prediction already exists: {0}")]
    DuplicatePrediction(PredictionId),

    /// A version with this ID already exists.
    #[error("version already exists: {0}")]
    DuplicateVersion(VersionId),

    /// The referenced prediction does not exist.
    #[error("prediction not found: {0}")]
    PredictionMissing(PredictionId),

    /// The referenced version does not exist.
    #[error("version not found: {0}")]
    VersionMissing(VersionId),

    /// Writing an approved row would leave two approved versions.
    #[error("prediction {prediction_id} already has approved version {approved_version_id}")]
    ApprovalConflict {
        prediction_id: PredictionId,
        approved_version_id: VersionId,
    },

    /// The prediction lifecycle does not allow this status change.
    #[error("prediction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: PredictionId,
        from: PredictionStatus,
        to: PredictionStatus,
    },
}

impl RepositoryError {
    /// check if this error indicates the referenced row doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            RepositoryError::PredictionMissing(_) | RepositoryError::VersionMissing(_) => true,
            RepositoryError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// check if this error is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        match self {
            RepositoryError::DuplicatePrediction(_)
            | RepositoryError::DuplicateVersion(_)
            | RepositoryError::ApprovalConflict { .. } => true,
            RepositoryError::Storage(e) => e.is_conflict(),
            _ => false,
        }
    }
}
