//! Review engine error types.

use std::fmt;

use thiserror::Error;

use crate::catalog::RepositoryError;
use crate::content::ContentError;
use crate::model::{PredictionId, VersionId};

/// Result type for review operations.
pub type ReviewResult<T> = Result<T, ReviewError>;

/// The entity a `NotFound` error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Prediction(PredictionId),
    Version(VersionId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Prediction(id) => write!(f, "prediction {}", id),
            EntityRef::Version(id) => write!(f, "version {}", id),
        }
    }
}

/// A failure of one of the backing stores.
#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("content store: {0}")]
    Content(#[from] ContentError),

    #[error("version repository: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors reported by the version service and the workflow facade.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The referenced prediction or version doesn't exist.
    #[error("{0} not found")]
    NotFound(EntityRef),

    /// Another version of the prediction is already approved.
    #[error("prediction {prediction_id} already has approved version {approved_version_id}")]
    AlreadyApproved {
        prediction_id: PredictionId,
        approved_version_id: VersionId,
    },

    /// The prediction is still being generated; approval is not allowed.
    #[error("prediction {0} is still in progress")]
    PredictionNotReady(PredictionId),

    /// The request was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A backing store failed.
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StorageFailure),
}

impl ReviewError {
    /// Errors caused by the request rather than the system.
    pub fn is_user_facing(&self) -> bool {
        !self.is_storage_failure()
    }

    pub fn is_storage_failure(&self) -> bool {
        matches!(self, ReviewError::StorageFailure(_))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<ContentError> for ReviewError {
    fn from(e: ContentError) -> Self {
        ReviewError::StorageFailure(StorageFailure::Content(e))
    }
}

impl From<RepositoryError> for ReviewError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::PredictionMissing(id) => ReviewError::NotFound(EntityRef::Prediction(id)),
            RepositoryError::VersionMissing(id) => ReviewError::NotFound(EntityRef::Version(id)),
            RepositoryError::ApprovalConflict {
                prediction_id,
                approved_version_id,
            } => ReviewError::AlreadyApproved {
                prediction_id,
                approved_version_id,
            },
            e @ RepositoryError::InvalidTransition { .. } => ReviewError::InvalidInput(e.to_string()),
            other => ReviewError::StorageFailure(StorageFailure::Repository(other)),
        }
    }
}
