/// Panel data models
///
/// Entities are cached read-only copies of store records. Each one maps to a
/// JSON object in its collection; the store-assigned id travels beside the
/// fields rather than inside them.

pub mod blog;
pub mod document;
pub mod exam;

pub use blog::{parse_tags, BlogEdit, BlogForm, BlogPost};
pub use document::{
    is_probably_url, Document, DocumentDraft, DocumentEdit, DocumentKind, DocumentPayload,
    ImageSetForm, InlineMarkupForm, LinkForm, PdfForm,
};
pub use exam::{Exam, ExamEdit, ExamForm};

use crate::error::{PanelError, PanelResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The three live collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Documents,
    Exams,
    Blogs,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Documents, Collection::Exams, Collection::Blogs];

    /// Collection name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Documents => "docs",
            Collection::Exams => "exams",
            Collection::Blogs => "blogs",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schemaless record as delivered by a store snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl StoredRecord {
    /// `createdAt` in epoch milliseconds, 0 when missing
    pub fn created_at(&self) -> i64 {
        self.fields
            .get("createdAt")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}

/// A typed entity living in one collection
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn created_at(&self) -> i64;

    /// Decode a stored record into the entity
    fn from_record(record: &StoredRecord) -> PanelResult<Self> {
        let mut entity: Self = serde_json::from_value(Value::Object(record.fields.clone()))?;
        entity.set_id(record.id.clone());
        Ok(entity)
    }

    /// Encode the entity's fields (without id) for a store insert
    fn to_fields(&self) -> PanelResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(PanelError::Internal(format!(
                "{} did not encode to an object: {}",
                Self::COLLECTION,
                other
            ))),
        }
    }
}

/// Current wall clock in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Trim and map empty input to `None`
pub(crate) fn non_empty(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
