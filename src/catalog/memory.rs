//! In-memory version repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::catalog::error::{RepositoryError, RepositoryResult};
use crate::catalog::VersionRepository;
use crate::model::{PredictionId, PredictionRecord, PredictionStatus, ReviewedVersion, VersionId};

#[derive(Debug, Default)]
struct Tables {
    predictions: HashMap<PredictionId, PredictionRecord>,
    versions: HashMap<VersionId, ReviewedVersion>,
    /// version IDs per prediction, in insertion order
    by_prediction: HashMap<PredictionId, Vec<VersionId>>,
}

impl Tables {
    fn approved_version(&self, prediction_id: &PredictionId, exclude: Option<&VersionId>) -> Option<&ReviewedVersion> {
        self.by_prediction
            .get(prediction_id)
            .into_iter()
            .flatten()
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| self.versions.get(id))
            .find(|row| row.is_approved)
    }

    fn ensure_no_other_approved(&self, prediction_id: &PredictionId, exclude: &VersionId) -> RepositoryResult<()> {
        match self.approved_version(prediction_id, Some(exclude)) {
            Some(approved) => Err(RepositoryError::ApprovalConflict {
                prediction_id: prediction_id.clone(),
                approved_version_id: approved.id.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// A version repository held in process memory.
///
/// One lock guards all tables, so every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryVersionRepository {
    tables: RwLock<Tables>,
}

impl MemoryVersionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionRepository for MemoryVersionRepository {
    fn insert_prediction(&self, record: &PredictionRecord) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        if tables.predictions.contains_key(&record.id) {
            return Err(RepositoryError::DuplicatePrediction(record.id.clone()));
        }
        tables.predictions.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_prediction(&self, id: &PredictionId) -> RepositoryResult<Option<PredictionRecord>> {
        Ok(self.tables.read().predictions.get(id).cloned())
    }

    fn update_prediction_status(
        &self,
        id: &PredictionId,
        status: PredictionStatus,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<PredictionRecord> {
        let mut tables = self.tables.write();
        let record = tables
            .predictions
            .get_mut(id)
            .ok_or_else(|| RepositoryError::PredictionMissing(id.clone()))?;
        if !record.status.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition {
                id: id.clone(),
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        record.updated_at = updated_at;
        Ok(record.clone())
    }

    fn insert_version(&self, row: &ReviewedVersion) -> RepositoryResult<()> {
        let mut tables = self.tables.write();
        if !tables.predictions.contains_key(&row.prediction_id) {
            return Err(RepositoryError::PredictionMissing(row.prediction_id.clone()));
        }
        if tables.versions.contains_key(&row.id) {
            return Err(RepositoryError::DuplicateVersion(row.id.clone()));
        }
        if row.is_approved {
            tables.ensure_no_other_approved(&row.prediction_id, &row.id)?;
        }

        tables.versions.insert(row.id.clone(), row.clone());
        tables
            .by_prediction
            .entry(row.prediction_id.clone())
            .or_default()
            .push(row.id.clone());
        Ok(())
    }

    fn get_version(&self, id: &VersionId) -> RepositoryResult<Option<ReviewedVersion>> {
        Ok(self.tables.read().versions.get(id).cloned())
    }

    fn list_versions_by_prediction(&self, prediction_id: &PredictionId) -> RepositoryResult<Vec<ReviewedVersion>> {
        let tables = self.tables.read();
        let mut versions: Vec<ReviewedVersion> = tables
            .by_prediction
            .get(prediction_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.versions.get(id).cloned())
            .collect();
        versions.sort_by(ReviewedVersion::newest_first);
        Ok(versions)
    }

    fn update_approval(
        &self,
        id: &VersionId,
        approved: bool,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<ReviewedVersion> {
        let mut tables = self.tables.write();
        let prediction_id = tables
            .versions
            .get(id)
            .map(|row| row.prediction_id.clone())
            .ok_or_else(|| RepositoryError::VersionMissing(id.clone()))?;
        if approved {
            tables.ensure_no_other_approved(&prediction_id, id)?;
        }

        let row = tables
            .versions
            .get_mut(id)
            .ok_or_else(|| RepositoryError::VersionMissing(id.clone()))?;
        row.is_approved = approved;
        row.updated_at = updated_at;
        Ok(row.clone())
    }

    fn find_approved_version(
        &self,
        prediction_id: &PredictionId,
        exclude: Option<&VersionId>,
    ) -> RepositoryResult<Option<ReviewedVersion>> {
        Ok(self.tables.read().approved_version(prediction_id, exclude).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::contract;

    #[test]
    fn test_prediction_round_trip() {
        contract::prediction_round_trip(&MemoryVersionRepository::new());
    }

    #[test]
    fn test_version_rows() {
        contract::version_rows(&MemoryVersionRepository::new());
    }

    #[test]
    fn test_approval_lookup() {
        contract::approval_lookup(&MemoryVersionRepository::new());
    }

    #[test]
    fn test_approval_exclusivity() {
        contract::approval_exclusivity(&MemoryVersionRepository::new());
    }
}
