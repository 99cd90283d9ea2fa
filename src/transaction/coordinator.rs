//! Approval coordinator - serializes approval decisions per prediction.

use tracing::warn;

use crate::catalog::VersionRepository;
use crate::model::{PredictionId, VersionId};
use crate::service::{ReviewError, ReviewResult};
use crate::transaction::locks::{PredictionGuard, PredictionLocks};

/// Guards the "at most one approved version per prediction" invariant.
///
/// Callers take the prediction's lock, run [`ensure_exclusive`], perform
/// their write, then drop the guard. Holding the guard across check and
/// write is what makes the pair atomic with respect to other approvals of
/// the same prediction.
///
/// The locks live in this process only. Across processes sharing a Git
/// store the invariant rests on the repository, which re-checks inside the
/// commit that writes an approved row and reports `ApprovalConflict`.
///
/// [`ensure_exclusive`]: ApprovalCoordinator::ensure_exclusive
#[derive(Debug, Clone, Default)]
pub struct ApprovalCoordinator {
    locks: PredictionLocks,
}

impl ApprovalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one prediction, blocking until it is free.
    pub fn lock(&self, prediction_id: &PredictionId) -> PredictionGuard {
        self.locks.lock(prediction_id)
    }

    /// Fail with `AlreadyApproved` if a version of the guarded prediction
    /// other than `exclude` is approved.
    pub fn ensure_exclusive<R>(
        &self,
        guard: &PredictionGuard,
        repo: &R,
        exclude: Option<&VersionId>,
    ) -> ReviewResult<()>
    where
        R: VersionRepository + ?Sized,
    {
        let prediction_id = guard.prediction_id();
        match repo.find_approved_version(prediction_id, exclude)? {
            Some(approved) => {
                warn!(
                    prediction_id = %prediction_id,
                    approved_version_id = %approved.id,
                    "approval rejected, another version is approved"
                );
                Err(ReviewError::AlreadyApproved {
                    prediction_id: prediction_id.clone(),
                    approved_version_id: approved.id,
                })
            }
            None => Ok(()),
        }
    }

    /// Number of predictions with a lock currently held or awaited.
    pub fn active_locks(&self) -> usize {
        self.locks.tracked()
    }
}
