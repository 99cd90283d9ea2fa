//! Blob operations for document storage.
//!
//! Every object the engine persists in Git (a row, a section of report
//! text) is written as a JSON document blob with a small metadata envelope
//! used for integrity checks and revision tracking.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::BlobId;

/// a stored document with metadata and a JSON object body
///
/// The internal format stored in Git:
/// ```text
/// {
///   "_key": "reviewed_versions/01hx...",
///   "_revision": 1,
///   "_created_at": "2024-01-01T00:00:00Z",
///   "_updated_at": "2024-01-01T00:00:00Z",
///   "isApproved": false,
///   ...
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// identity of the document (must match where it is stored)
    pub key: String,
    /// revision number, bumped on every rewrite
    pub revision: u64,
    /// creation timestamp
    pub created_at: DateTime<Utc>,
    /// last update timestamp
    pub updated_at: DateTime<Utc>,
    /// body fields
    pub body: Map<String, Value>,
}

impl Document {
    /// creates a new revision-1 document stamped with the current time
    pub fn new(key: impl Into<String>, body: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            revision: 1,
            created_at: now,
            updated_at: now,
            body,
        }
    }

    /// create a document from any value serializing to a JSON object
    pub fn from_serializable<T: Serialize>(key: impl Into<String>, value: &T) -> StorageResult<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self::new(key, map)),
            _ => Err(StorageError::Internal(
                "document body must serialize to a JSON object".to_string(),
            )),
        }
    }

    /// create the next revision of this document with a new body
    pub fn with_body(self, body: Map<String, Value>) -> Self {
        Self {
            key: self.key,
            revision: self.revision + 1,
            created_at: self.created_at,
            updated_at: Utc::now(),
            body,
        }
    }

    /// decode the body into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        let value = Value::Object(self.body.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// get a body field by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }
}

/// internal format for JSON serialization
///
/// uses `_` prefix for metadata fields to avoid conflicts with body fields
#[derive(Serialize, Deserialize)]
struct DocumentJson {
    #[serde(rename = "_key")]
    key: String,
    #[serde(rename = "_revision")]
    revision: u64,
    #[serde(rename = "_created_at")]
    created_at: DateTime<Utc>,
    #[serde(rename = "_updated_at")]
    updated_at: DateTime<Utc>,
    #[serde(flatten)]
    body: Map<String, Value>,
}

/// serialize a document to JSON bytes
///
/// body keys come out sorted, so identical documents produce identical blobs
pub fn serialize_document(doc: &Document) -> StorageResult<Vec<u8>> {
    let json = DocumentJson {
        key: doc.key.clone(),
        revision: doc.revision,
        created_at: doc.created_at,
        updated_at: doc.updated_at,
        body: doc.body.clone(),
    };

    Ok(serde_json::to_vec_pretty(&json)?)
}

/// deserialize a document from JSON bytes
///
/// validates that the key in the envelope matches the expected key
pub fn deserialize_document(bytes: &[u8], expected_key: &str) -> StorageResult<Document> {
    let json: DocumentJson = serde_json::from_slice(bytes)?;

    if json.key != expected_key {
        return Err(StorageError::CorruptedData {
            path: expected_key.into(),
            reason: format!(
                "key mismatch: expected '{}' but content has '{}'",
                expected_key, json.key
            ),
        });
    }

    Ok(Document {
        key: json.key,
        revision: json.revision,
        created_at: json.created_at,
        updated_at: json.updated_at,
        body: json.body,
    })
}

/// write a document as a blob to the repository
///
/// returns the blob ID (SHA-1 hash of the content)
pub fn write_blob(repo: &git2::Repository, doc: &Document) -> StorageResult<BlobId> {
    let bytes = serialize_document(doc)?;
    let oid = repo.blob(&bytes)?;
    Ok(BlobId::new(oid))
}

/// read a blob's content from the repository
pub fn read_blob(repo: &git2::Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw())?;
    Ok(blob.content().to_vec())
}
