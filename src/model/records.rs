//! Prediction and reviewed-version records.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{PredictionId, VersionId};
use crate::model::section::{Section, Sections};
use crate::storage::{InvalidNameError, ObjectPath};

/// Path of a section blob in the content store.
pub type ContentPath = ObjectPath;

/// Build the content path for one section of a version:
/// `{base}/{version_id}/{section}.json`.
pub fn section_path(
    base: &ContentPath,
    version_id: &VersionId,
    section: Section,
) -> Result<ContentPath, InvalidNameError> {
    base.join(version_id.as_str())?.join(&section.file_name())
}

/// Lifecycle state of the upstream prediction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    InProgress,
    Done,
}

impl PredictionStatus {
    /// whether approval actions are allowed
    pub fn is_done(&self) -> bool {
        matches!(self, PredictionStatus::Done)
    }

    /// The lifecycle only moves forward: `in_progress -> done`. Staying
    /// in the same state is allowed.
    pub fn can_transition_to(&self, next: PredictionStatus) -> bool {
        matches!(
            (self, next),
            (PredictionStatus::InProgress, _) | (PredictionStatus::Done, PredictionStatus::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::InProgress => "in_progress",
            PredictionStatus::Done => "done",
        }
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(PredictionStatus::InProgress),
            "done" => Ok(PredictionStatus::Done),
            other => Err(format!("unknown prediction status: {}", other)),
        }
    }
}

/// A machine-generated analysis run.
///
/// Owned by the upstream prediction service; the engine only reads it,
/// apart from recording the `in_progress -> done` transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: PredictionId,
    pub company_id: String,
    pub model_version: String,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// machine-generated section content, where produced
    #[serde(default)]
    pub content_paths: Sections<Option<ContentPath>>,
}

impl PredictionRecord {
    /// a fresh in-progress prediction with no content yet
    pub fn new(id: PredictionId, company_id: impl Into<String>, model_version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            company_id: company_id.into(),
            model_version: model_version.into(),
            status: PredictionStatus::InProgress,
            created_at: now,
            updated_at: now,
            content_paths: Sections::default(),
        }
    }

    pub fn with_status(mut self, status: PredictionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_path(mut self, section: Section, path: ContentPath) -> Self {
        self.content_paths.set(section, Some(path));
        self
    }
}

/// One human-curated rendition of a prediction's report.
///
/// Content paths and `created_at` never change after insert; only
/// `is_approved` and `updated_at` do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedVersion {
    pub id: VersionId,
    pub prediction_id: PredictionId,
    pub model_version: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content_paths: Sections<Option<ContentPath>>,
}

impl ReviewedVersion {
    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            id: self.id.clone(),
            prediction_id: self.prediction_id.clone(),
            model_version: self.model_version.clone(),
            is_approved: self.is_approved,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// ordering for "latest version first": newest `created_at`, then
    /// highest ID
    pub fn newest_first(a: &ReviewedVersion, b: &ReviewedVersion) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

/// Version metadata without content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub id: VersionId,
    pub prediction_id: PredictionId,
    pub model_version: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A version's approval flag and its section text.
///
/// `None` means no content is available for the section, either because
/// the version has none or because it could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionContent {
    pub version_id: VersionId,
    pub is_approved: bool,
    pub content: Sections<Option<String>>,
}

/// The machine-generated content of a prediction, as loaded into the
/// editor before the first reviewed version exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionContent {
    pub prediction_id: PredictionId,
    pub status: PredictionStatus,
    pub content: Sections<Option<String>>,
}
