//! Domain types: identifiers, report sections, and the prediction and
//! reviewed-version records.

mod ids;
mod records;
mod section;

pub use ids::{PredictionId, VersionId, VersionIdGenerator};
pub use records::{
    section_path, ContentPath, PredictionContent, PredictionRecord, PredictionStatus, ReviewedVersion,
    VersionContent, VersionSummary,
};
pub use section::{Section, Sections, UnknownSection};
