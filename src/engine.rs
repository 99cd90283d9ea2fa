//! Engine - wires a configuration to concrete stores and the review
//! workflow.
//!
//! The backend is chosen at runtime, so the engine holds its stores as
//! trait objects. With the git backend the content store and the
//! repository share one [`GitRepository`] handle, and therefore one
//! lock and one history.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::catalog::{GitVersionRepository, MemoryVersionRepository, RepositoryError, VersionRepository};
use crate::config::{Backend, ConfigError, EngineConfig};
use crate::content::{ContentStore, GitContentStore, MemoryContentStore};
use crate::model::{PredictionId, PredictionRecord, PredictionStatus};
use crate::service::{ReviewError, ReviewWorkflow, VersionService};
use crate::storage::{GitRepository, StorageError};

/// The version service over runtime-selected stores.
pub type DynVersionService = VersionService<dyn ContentStore, dyn VersionRepository>;

/// The workflow over runtime-selected stores.
pub type DynReviewWorkflow = ReviewWorkflow<dyn ContentStore, dyn VersionRepository>;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("review store not found: {0}")]
    NotFound(PathBuf),
}

/// A configured review engine.
pub struct Engine {
    config: EngineConfig,
    repo: Arc<dyn VersionRepository>,
    workflow: DynReviewWorkflow,
}

impl Engine {
    /// Open the engine described by `config`.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let base_path = config.base_path()?;

        let (content, repo): (Arc<dyn ContentStore>, Arc<dyn VersionRepository>) = match config.backend {
            Backend::Memory => (
                Arc::new(MemoryContentStore::new()),
                Arc::new(MemoryVersionRepository::new()),
            ),
            Backend::Git => {
                let git = if config.create_if_missing {
                    GitRepository::open_or_init(&config.data_dir)?
                } else if config.data_dir.exists() {
                    GitRepository::open(&config.data_dir)?
                } else {
                    return Err(EngineError::NotFound(config.data_dir.clone()));
                };
                (
                    Arc::new(GitContentStore::new(git.clone())),
                    Arc::new(GitVersionRepository::new(git)?),
                )
            }
        };

        info!(
            backend = %config.backend,
            data_dir = %config.data_dir.display(),
            base_path = %base_path,
            "opened review engine"
        );

        let service = VersionService::new(content, Arc::clone(&repo), base_path);
        Ok(Self {
            config,
            repo,
            workflow: ReviewWorkflow::new(Arc::new(service)),
        })
    }

    /// A fresh engine over in-memory stores.
    pub fn in_memory() -> EngineResult<Self> {
        Self::open(EngineConfig::in_memory())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workflow(&self) -> &DynReviewWorkflow {
        &self.workflow
    }

    pub fn service(&self) -> &Arc<DynVersionService> {
        self.workflow.service()
    }

    pub fn repository(&self) -> &Arc<dyn VersionRepository> {
        &self.repo
    }

    // ==================== Upstream Side ====================

    /// Record a new in-progress prediction, as the prediction pipeline does
    /// when a run starts. A new ID is generated when none is given.
    pub fn register_prediction(
        &self,
        id: Option<PredictionId>,
        company_id: &str,
        model_version: &str,
    ) -> EngineResult<PredictionRecord> {
        let id = id.unwrap_or_else(PredictionId::generate);
        let record = PredictionRecord::new(id, company_id, model_version);
        self.repo.insert_prediction(&record)?;
        info!(prediction_id = %record.id, company_id, "registered prediction");
        Ok(record)
    }

    /// Mark a prediction's run as finished, unlocking approval.
    pub fn complete_prediction(&self, id: &PredictionId) -> EngineResult<PredictionRecord> {
        let record = self
            .repo
            .update_prediction_status(id, PredictionStatus::Done, Utc::now())?;
        info!(prediction_id = %id, "prediction completed");
        Ok(record)
    }
}
