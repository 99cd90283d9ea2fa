//! Review workflow - the request-facing facade over the version service.
//!
//! Requests arrive as loosely-typed JSON. This layer validates them into
//! typed calls and hands back serializable responses with camelCase keys.
//!
//! ```text
//! save_version   { "predictionId", "content": { section: string|null },
//!                  "modelVersion", "approve"? }
//! set_approval   { "approve" }
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::catalog::VersionRepository;
use crate::content::ContentStore;
use crate::model::{
    PredictionContent, PredictionId, Section, Sections, VersionContent, VersionId, VersionSummary,
};
use crate::service::error::{ReviewError, ReviewResult};
use crate::service::version_service::VersionService;

/// Validates raw requests and dispatches them to a [`VersionService`].
pub struct ReviewWorkflow<C: ?Sized, R: ?Sized> {
    service: Arc<VersionService<C, R>>,
}

impl<C: ?Sized, R: ?Sized> Clone for ReviewWorkflow<C, R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<C, R> ReviewWorkflow<C, R>
where
    C: ContentStore + ?Sized,
    R: VersionRepository + ?Sized,
{
    pub fn new(service: Arc<VersionService<C, R>>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<VersionService<C, R>> {
        &self.service
    }

    /// Save a new version from a request body.
    pub fn save_version(&self, request: &Value) -> ReviewResult<VersionSummary> {
        let body = as_object(request, "request")?;
        let prediction_id: PredictionId = parse_id(required_str(body, "predictionId")?, "predictionId")?;
        let model_version = required_str(body, "modelVersion")?;
        let content = parse_content(body.get("content"))?;
        let approve = match body.get("approve") {
            None => false,
            Some(value) => as_bool(value, "approve")?,
        };

        self.service.create_version(&prediction_id, &content, model_version, approve)
    }

    /// Approve or disapprove a version from a request body.
    pub fn set_approval(&self, version_id: &str, request: &Value) -> ReviewResult<VersionSummary> {
        let version_id: VersionId = parse_id(version_id, "versionId")?;
        let body = as_object(request, "request")?;
        let approve = match body.get("approve") {
            Some(value) => as_bool(value, "approve")?,
            None => return Err(ReviewError::invalid("missing field 'approve'")),
        };

        self.service.approve_version(&version_id, approve)
    }

    pub fn list_versions(&self, prediction_id: &str) -> ReviewResult<Vec<VersionSummary>> {
        self.service.list_versions(&parse_id(prediction_id, "predictionId")?)
    }

    pub fn version_content(&self, version_id: &str) -> ReviewResult<VersionContent> {
        self.service.get_version_content(&parse_id(version_id, "versionId")?)
    }

    pub fn approved_version(&self, prediction_id: &str) -> ReviewResult<Option<VersionSummary>> {
        self.service.approved_version(&parse_id(prediction_id, "predictionId")?)
    }

    pub fn prediction_content(&self, prediction_id: &str) -> ReviewResult<PredictionContent> {
        self.service.get_prediction_content(&parse_id(prediction_id, "predictionId")?)
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> ReviewResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ReviewError::invalid(format!("{} must be a JSON object", what)))
}

fn as_bool(value: &Value, field: &str) -> ReviewResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| ReviewError::invalid(format!("field '{}' must be a boolean", field)))
}

fn required_str<'a>(body: &'a Map<String, Value>, field: &str) -> ReviewResult<&'a str> {
    match body.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ReviewError::invalid(format!("field '{}' must be a string", field))),
        None => Err(ReviewError::invalid(format!("missing field '{}'", field))),
    }
}

fn parse_id<T>(raw: &str, field: &str) -> ReviewResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ReviewError::invalid(format!("invalid {}: {}", field, e)))
}

/// Missing and null sections become empty text.
fn parse_content(value: Option<&Value>) -> ReviewResult<Sections<String>> {
    let value = value.ok_or_else(|| ReviewError::invalid("missing field 'content'"))?;
    let body = as_object(value, "field 'content'")?;

    let mut content = Sections::<String>::default();
    for (name, text) in body {
        let section: Section = name
            .parse()
            .map_err(|e| ReviewError::invalid(format!("{}", e)))?;
        match text {
            Value::String(s) => content.set(section, s.clone()),
            Value::Null => {}
            _ => {
                return Err(ReviewError::invalid(format!(
                    "section '{}' must be a string or null",
                    name
                )))
            }
        }
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryVersionRepository;
    use crate::content::MemoryContentStore;
    use crate::model::{ContentPath, PredictionRecord, PredictionStatus};
    use serde_json::json;

    type Workflow = ReviewWorkflow<MemoryContentStore, MemoryVersionRepository>;

    fn workflow(status: PredictionStatus) -> Workflow {
        let repo = Arc::new(MemoryVersionRepository::new());
        repo.insert_prediction(
            &PredictionRecord::new(PredictionId::new("p1").unwrap(), "acme", "model-1").with_status(status),
        )
        .unwrap();
        let service = VersionService::new(
            Arc::new(MemoryContentStore::new()),
            repo,
            ContentPath::new("predictions").unwrap(),
        );
        ReviewWorkflow::new(Arc::new(service))
    }

    fn assert_invalid(result: ReviewResult<impl std::fmt::Debug>) {
        match result {
            Err(ReviewError::InvalidInput(_)) => {}
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_read_back() {
        let wf = workflow(PredictionStatus::Done);
        let saved = wf
            .save_version(&json!({
                "predictionId": "p1",
                "modelVersion": "model-1",
                "content": {
                    "chloralkaliSummary": "Viable.",
                    "electrodialysisSummary": null
                },
                "approve": true
            }))
            .unwrap();
        assert!(saved.is_approved);

        let content = wf.version_content(saved.id.as_str()).unwrap();
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["isApproved"], json!(true));
        assert_eq!(json["versionId"], json!(saved.id.as_str()));
        assert_eq!(json["content"]["chloralkaliSummary"], json!("Viable."));
        assert_eq!(json["content"]["electrodialysisSummary"], json!(""));

        let listed = serde_json::to_value(wf.list_versions("p1").unwrap()).unwrap();
        assert_eq!(listed[0]["predictionId"], json!("p1"));
        assert_eq!(listed[0]["modelVersion"], json!("model-1"));
        assert_eq!(
            wf.approved_version("p1").unwrap().map(|v| v.id),
            Some(saved.id)
        );
    }

    #[test]
    fn test_approve_defaults_to_draft() {
        let wf = workflow(PredictionStatus::InProgress);
        let saved = wf
            .save_version(&json!({"predictionId": "p1", "modelVersion": "m", "content": {}}))
            .unwrap();
        assert!(!saved.is_approved);
    }

    #[test]
    fn test_approve_must_be_boolean() {
        let wf = workflow(PredictionStatus::Done);
        assert_invalid(wf.save_version(&json!({
            "predictionId": "p1", "modelVersion": "m", "content": {}, "approve": "true"
        })));

        let saved = wf
            .save_version(&json!({"predictionId": "p1", "modelVersion": "m", "content": {}}))
            .unwrap();
        assert_invalid(wf.set_approval(saved.id.as_str(), &json!({"approve": "true"})));
        assert_invalid(wf.set_approval(saved.id.as_str(), &json!({"approve": 1})));
        assert_invalid(wf.set_approval(saved.id.as_str(), &json!({})));
        assert_invalid(wf.set_approval(saved.id.as_str(), &json!(true)));

        assert!(wf.set_approval(saved.id.as_str(), &json!({"approve": true})).unwrap().is_approved);
    }

    #[test]
    fn test_content_must_be_object_of_known_sections() {
        let wf = workflow(PredictionStatus::Done);
        let base = |content: Value| json!({"predictionId": "p1", "modelVersion": "m", "content": content});

        assert_invalid(wf.save_version(&json!({"predictionId": "p1", "modelVersion": "m"})));
        assert_invalid(wf.save_version(&base(json!("text"))));
        assert_invalid(wf.save_version(&base(json!(["a"]))));
        assert_invalid(wf.save_version(&base(json!({"summary": "x"}))));
        assert_invalid(wf.save_version(&base(json!({"chloralkaliSummary": 3}))));
        assert!(wf.list_versions("p1").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_ids_are_invalid() {
        let wf = workflow(PredictionStatus::Done);
        assert_invalid(wf.list_versions("../etc"));
        assert_invalid(wf.version_content(""));
        assert_invalid(wf.set_approval("a b", &json!({"approve": true})));
        assert_invalid(wf.save_version(&json!({
            "predictionId": "p/1", "modelVersion": "m", "content": {}
        })));
        assert_invalid(wf.save_version(&json!({
            "predictionId": 7, "modelVersion": "m", "content": {}
        })));
    }

    #[test]
    fn test_well_formed_unknown_ids_are_not_found() {
        let wf = workflow(PredictionStatus::Done);
        assert!(matches!(wf.list_versions("p2"), Err(ReviewError::NotFound(_))));
        assert!(matches!(wf.version_content("v9"), Err(ReviewError::NotFound(_))));
    }

    #[test]
    fn test_prediction_content() {
        let wf = workflow(PredictionStatus::InProgress);
        let json = serde_json::to_value(wf.prediction_content("p1").unwrap()).unwrap();
        assert_eq!(json["predictionId"], json!("p1"));
        assert_eq!(json["status"], json!("in_progress"));
        assert_eq!(json["content"]["chloralkaliInDepth"], Value::Null);
    }
}
