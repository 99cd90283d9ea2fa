//! Version service - creation, listing, content retrieval and approval of
//! reviewed versions.
//!
//! The service is the only writer of version rows. A write happens in two
//! steps: the five section texts go to the content store first, then one
//! row pointing at them goes to the repository. The row insert is the
//! commit point; a failed blob write aborts before it, so a row never
//! points at missing content.

use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::VersionRepository;
use crate::content::{ContentResult, ContentStore};
use crate::model::{
    section_path, ContentPath, PredictionContent, PredictionId, PredictionRecord, ReviewedVersion, Section,
    Sections, VersionContent, VersionId, VersionIdGenerator, VersionSummary,
};
use crate::service::error::{EntityRef, ReviewError, ReviewResult};
use crate::transaction::ApprovalCoordinator;

/// Orchestrates reviewed versions over a content store and a repository.
///
/// Share it across threads behind an `Arc`; every method takes `&self`.
pub struct VersionService<C: ?Sized, R: ?Sized> {
    content: Arc<C>,
    repo: Arc<R>,
    coordinator: ApprovalCoordinator,
    ids: VersionIdGenerator,
    base_path: ContentPath,
}

impl<C, R> VersionService<C, R>
where
    C: ContentStore + ?Sized,
    R: VersionRepository + ?Sized,
{
    /// Create a service writing section blobs under `base_path`.
    pub fn new(content: Arc<C>, repo: Arc<R>, base_path: ContentPath) -> Self {
        Self {
            content,
            repo,
            coordinator: ApprovalCoordinator::new(),
            ids: VersionIdGenerator::new(),
            base_path,
        }
    }

    pub fn content_store(&self) -> &Arc<C> {
        &self.content
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn coordinator(&self) -> &ApprovalCoordinator {
        &self.coordinator
    }

    pub fn base_path(&self) -> &ContentPath {
        &self.base_path
    }

    // ==================== Writes ====================

    /// Save a new version of a prediction, optionally approving it.
    ///
    /// Drafts may be saved while the prediction is still in progress;
    /// saving an approved version requires it to be done. With `approve`
    /// set, the exclusivity check and the row insert happen under the
    /// prediction's lock, and an existing approved version fails the call
    /// before anything is written. The repository repeats the check as
    /// part of the insert, which catches writers in other processes.
    pub fn create_version(
        &self,
        prediction_id: &PredictionId,
        content: &Sections<String>,
        model_version: &str,
        approve: bool,
    ) -> ReviewResult<VersionSummary> {
        if model_version.trim().is_empty() {
            return Err(ReviewError::invalid("model version must not be empty"));
        }

        let prediction = self.require_prediction(prediction_id)?;
        if approve && !prediction.status.is_done() {
            warn!(prediction_id = %prediction_id, "approved save rejected, prediction in progress");
            return Err(ReviewError::PredictionNotReady(prediction_id.clone()));
        }

        let guard = if approve {
            let guard = self.coordinator.lock(prediction_id);
            self.coordinator.ensure_exclusive(&guard, &*self.repo, None)?;
            Some(guard)
        } else {
            None
        };

        let version_id = self.ids.next_id();
        let paths = self.section_paths(&version_id)?;
        self.write_sections(&version_id, &paths, content)?;

        let now = Utc::now();
        let row = ReviewedVersion {
            id: version_id,
            prediction_id: prediction_id.clone(),
            model_version: model_version.to_string(),
            is_approved: approve,
            created_at: now,
            updated_at: now,
            content_paths: paths,
        };
        self.repo.insert_version(&row)?;
        drop(guard);

        info!(
            prediction_id = %prediction_id,
            version_id = %row.id,
            approved = approve,
            "created version"
        );
        Ok(row.summary())
    }

    /// Approve or disapprove a version.
    ///
    /// Fails with `PredictionNotReady` for either flag while the prediction
    /// is in progress. Approving fails with `AlreadyApproved` when another
    /// version holds the approval; re-approving the approved version and
    /// disapproving are always allowed.
    pub fn approve_version(&self, version_id: &VersionId, approve: bool) -> ReviewResult<VersionSummary> {
        let version = self.require_version(version_id)?;
        let prediction_id = &version.prediction_id;

        let guard = self.coordinator.lock(prediction_id);
        let prediction = self.require_prediction(prediction_id)?;
        if !prediction.status.is_done() {
            warn!(
                prediction_id = %prediction_id,
                version_id = %version_id,
                "approval change rejected, prediction in progress"
            );
            return Err(ReviewError::PredictionNotReady(prediction_id.clone()));
        }

        if approve {
            self.coordinator.ensure_exclusive(&guard, &*self.repo, Some(version_id))?;
        }
        let updated = self.repo.update_approval(version_id, approve, Utc::now())?;
        drop(guard);

        info!(
            prediction_id = %prediction_id,
            version_id = %version_id,
            approved = approve,
            "updated version approval"
        );
        Ok(updated.summary())
    }

    // ==================== Reads ====================

    /// All versions of a prediction, newest first.
    pub fn list_versions(&self, prediction_id: &PredictionId) -> ReviewResult<Vec<VersionSummary>> {
        self.require_prediction(prediction_id)?;
        let versions = self.repo.list_versions_by_prediction(prediction_id)?;
        debug!(prediction_id = %prediction_id, count = versions.len(), "listed versions");
        Ok(versions.iter().map(ReviewedVersion::summary).collect())
    }

    /// The most recent version of a prediction, if any.
    pub fn latest_version(&self, prediction_id: &PredictionId) -> ReviewResult<Option<VersionSummary>> {
        Ok(self.list_versions(prediction_id)?.into_iter().next())
    }

    /// The approved version of a prediction, if any.
    pub fn approved_version(&self, prediction_id: &PredictionId) -> ReviewResult<Option<VersionSummary>> {
        self.require_prediction(prediction_id)?;
        let approved = self.repo.find_approved_version(prediction_id, None)?;
        Ok(approved.as_ref().map(ReviewedVersion::summary))
    }

    /// A version's approval flag and section text.
    ///
    /// Sections that are unset, missing from the store, or fail to load
    /// come back as `None`; only an unknown version fails the call.
    pub fn get_version_content(&self, version_id: &VersionId) -> ReviewResult<VersionContent> {
        let version = self.require_version(version_id)?;
        let content = self.fetch_sections(&version.content_paths);
        debug!(version_id = %version_id, "loaded version content");

        Ok(VersionContent {
            version_id: version.id,
            is_approved: version.is_approved,
            content,
        })
    }

    /// The machine-generated content of a prediction, fetched leniently
    /// like version content.
    pub fn get_prediction_content(&self, prediction_id: &PredictionId) -> ReviewResult<PredictionContent> {
        let prediction = self.require_prediction(prediction_id)?;
        let content = self.fetch_sections(&prediction.content_paths);
        debug!(prediction_id = %prediction_id, "loaded prediction content");

        Ok(PredictionContent {
            prediction_id: prediction.id,
            status: prediction.status,
            content,
        })
    }

    // ==================== Helpers ====================

    fn require_prediction(&self, id: &PredictionId) -> ReviewResult<PredictionRecord> {
        self.repo
            .get_prediction(id)?
            .ok_or_else(|| ReviewError::NotFound(EntityRef::Prediction(id.clone())))
    }

    fn require_version(&self, id: &VersionId) -> ReviewResult<ReviewedVersion> {
        self.repo
            .get_version(id)?
            .ok_or_else(|| ReviewError::NotFound(EntityRef::Version(id.clone())))
    }

    /// `{base}/{version_id}/{section}.json` for every section
    fn section_paths(&self, version_id: &VersionId) -> ReviewResult<Sections<Option<ContentPath>>> {
        let mut paths = Sections::default();
        for section in Section::ALL {
            let path = section_path(&self.base_path, version_id, section)
                .map_err(|e| ReviewError::invalid(format!("content path for {}: {}", section, e)))?;
            paths.set(section, Some(path));
        }
        Ok(paths)
    }

    /// Write all sections in parallel; the first failure aborts the save.
    fn write_sections(
        &self,
        version_id: &VersionId,
        paths: &Sections<Option<ContentPath>>,
        content: &Sections<String>,
    ) -> ReviewResult<()> {
        let writes: Vec<(Section, &ContentPath)> = paths
            .iter()
            .filter_map(|(section, path)| path.as_ref().map(|path| (section, path)))
            .collect();
        let result: ContentResult<()> = writes
            .par_iter()
            .try_for_each(|(section, path)| self.content.put(path, content.get(*section)));

        if let Err(e) = result {
            warn!(version_id = %version_id, error = %e, "section write failed, version not saved");
            return Err(e.into());
        }
        Ok(())
    }

    /// Fetch every set section in parallel, downgrading failures to `None`.
    fn fetch_sections(&self, paths: &Sections<Option<ContentPath>>) -> Sections<Option<String>> {
        let reads: Vec<(Section, &Option<ContentPath>)> = paths.iter().collect();
        let fetched: Vec<(Section, Option<String>)> = reads
            .into_par_iter()
            .map(|(section, path)| (section, path.as_ref().and_then(|p| self.fetch_lenient(section, p))))
            .collect();
        Sections::from_partial(fetched)
    }

    fn fetch_lenient(&self, section: Section, path: &ContentPath) -> Option<String> {
        match self.content.get(path) {
            Ok(Some(text)) => Some(text),
            Ok(None) => {
                warn!(section = %section, path = %path, "section content not found");
                None
            }
            Err(e) => {
                warn!(section = %section, path = %path, error = %e, "section content unavailable");
                None
            }
        }
    }
}
