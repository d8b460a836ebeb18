/// API routes and handlers
pub mod admin;
pub mod blogs;
pub mod documents;
pub mod exams;
pub mod health;
pub mod live;

use crate::{
    context::AppContext,
    error::{PanelError, PanelResult},
    media::UploadFile,
    models::Entity,
};
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(admin::routes())
        .merge(documents::routes())
        .merge(exams::routes())
        .merge(blogs::routes())
        .merge(live::routes())
}

/// File carried inside a JSON body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileBody {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub data_base64: String,
}

impl UploadFileBody {
    pub fn decode(self) -> PanelResult<UploadFile> {
        let data = general_purpose::STANDARD
            .decode(self.data_base64.trim())
            .map_err(|e| {
                PanelError::Validation(format!("{} is not valid base64: {}", self.file_name, e))
            })?;

        Ok(UploadFile {
            file_name: self.file_name,
            content_type: self.content_type.filter(|ct| !ct.is_empty()),
            data,
        })
    }
}

pub fn decode_files(files: Vec<UploadFileBody>) -> PanelResult<Vec<UploadFile>> {
    files.into_iter().map(UploadFileBody::decode).collect()
}

/// Entity with its store id alongside the record fields
#[derive(Debug, Clone, Serialize)]
pub struct Identified<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

impl<T: Entity> From<T> for Identified<T> {
    fn from(record: T) -> Self {
        Self {
            id: record.id().to_string(),
            record,
        }
    }
}

/// Response to a create call
#[derive(Debug, Serialize)]
pub struct Created {
    pub id: String,
}
