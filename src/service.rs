/// Panel write operations
///
/// Every save runs under a submission ticket for its form, uploads any files
/// first, then writes the store. A failed store write discards the files that
/// were uploaded for it.
use crate::{
    compose::image_snippet,
    error::{PanelError, PanelResult},
    media::{pipeline::UploadBatch, MediaFolder, UploadFile, UploadPipeline},
    models::{
        now_millis, BlogEdit, BlogForm, BlogPost, Collection, Document, DocumentDraft,
        DocumentEdit, Entity, Exam, ExamEdit, ExamForm,
    },
    store::ContentStore,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// In-flight form submissions
#[derive(Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Held while a submission runs; released on drop
pub struct SubmissionTicket {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SubmissionGuard {
    /// Claim `key`; fails with `Conflict` while another submission holds it
    pub fn acquire(&self, key: &str) -> PanelResult<SubmissionTicket> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| PanelError::Internal("Submission guard poisoned".to_string()))?;

        if !in_flight.insert(key.to_string()) {
            return Err(PanelError::Conflict(format!("{} is already being saved", key)));
        }

        Ok(SubmissionTicket {
            key: key.to_string(),
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .map(|in_flight| in_flight.contains(key))
            .unwrap_or(false)
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}

pub fn document_update_key(id: &str) -> String {
    format!("documents.update:{}", id)
}

pub fn exam_update_key(id: &str) -> String {
    format!("exams.update:{}", id)
}

pub fn blog_update_key(id: &str) -> String {
    format!("blogs.update:{}", id)
}

pub const EXAM_CREATE_KEY: &str = "exams.create";
pub const BLOG_CREATE_KEY: &str = "blogs.create";
pub const BLOG_IMAGE_KEY: &str = "blogs.image";

/// Upload-then-write service shared by the panel and the HTTP API
#[derive(Clone)]
pub struct PanelService {
    store: Arc<dyn ContentStore>,
    uploads: UploadPipeline,
    guard: SubmissionGuard,
}

impl PanelService {
    pub fn new(store: Arc<dyn ContentStore>, uploads: UploadPipeline) -> Self {
        Self {
            store,
            uploads,
            guard: SubmissionGuard::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Whether the form with `key` may be submitted right now
    pub fn can_submit(&self, key: &str) -> bool {
        !self.guard.is_held(key)
    }

    /// Insert an entity, discarding `batch` if the write fails
    async fn insert_entity<E: Entity>(&self, entity: &E, batch: UploadBatch) -> PanelResult<String> {
        let fields = match entity.to_fields() {
            Ok(fields) => fields,
            Err(e) => {
                self.uploads.rollback(batch).await;
                return Err(e);
            }
        };

        match self.store.insert(E::COLLECTION, fields).await {
            Ok(id) => {
                info!("Created {} record {}", E::COLLECTION, id);
                Ok(id)
            }
            Err(e) => {
                warn!("Failed to create {} record: {}", E::COLLECTION, e);
                self.uploads.rollback(batch).await;
                Err(e)
            }
        }
    }

    async fn apply_patch(&self, collection: Collection, id: &str, patch: Map<String, Value>) -> PanelResult<()> {
        self.store.update(collection, id, patch).await.map_err(|e| {
            warn!("Failed to update {} record {}: {}", collection, id, e);
            e
        })?;
        info!("Updated {} record {}", collection, id);
        Ok(())
    }

    async fn remove(&self, collection: Collection, id: &str) -> PanelResult<()> {
        self.store.delete(collection, id).await.map_err(|e| {
            warn!("Failed to delete {} record {}: {}", collection, id, e);
            e
        })?;
        info!("Deleted {} record {}", collection, id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub async fn create_document(&self, draft: &DocumentDraft) -> PanelResult<String> {
        if !draft.is_submittable() {
            return Err(PanelError::Validation(
                "Required document fields are empty".to_string(),
            ));
        }

        let _ticket = self.guard.acquire(&draft.form_key())?;

        let (files, folder) = draft.uploads();
        let batch = self.uploads.upload_all(&files, folder).await?;

        let doc = match draft.build(batch.urls(), now_millis()) {
            Ok(doc) => doc,
            Err(e) => {
                self.uploads.rollback(batch).await;
                return Err(e);
            }
        };

        self.insert_entity(&doc, batch).await
    }

    pub async fn update_document(&self, current: &Document, edit: &DocumentEdit) -> PanelResult<()> {
        let _ticket = self.guard.acquire(&document_update_key(&current.id))?;
        self.apply_patch(Collection::Documents, &current.id, edit.patch(current))
            .await
    }

    pub async fn delete_document(&self, id: &str) -> PanelResult<()> {
        self.remove(Collection::Documents, id).await
    }

    // ------------------------------------------------------------------
    // Exams
    // ------------------------------------------------------------------

    pub async fn create_exam(&self, form: &ExamForm) -> PanelResult<String> {
        if !form.is_submittable() {
            return Err(PanelError::Validation(
                "Semester, subject and exam name are required".to_string(),
            ));
        }

        let _ticket = self.guard.acquire(EXAM_CREATE_KEY)?;

        let files: Vec<&UploadFile> = form.images.iter().collect();
        let batch = self.uploads.upload_all(&files, MediaFolder::ExamImages).await?;

        let exam: Exam = match form.build(batch.urls(), now_millis()) {
            Ok(exam) => exam,
            Err(e) => {
                self.uploads.rollback(batch).await;
                return Err(e);
            }
        };

        self.insert_entity(&exam, batch).await
    }

    pub async fn update_exam(&self, current: &Exam, edit: &ExamEdit) -> PanelResult<()> {
        let _ticket = self.guard.acquire(&exam_update_key(&current.id))?;
        self.apply_patch(Collection::Exams, &current.id, edit.patch(current))
            .await
    }

    pub async fn delete_exam(&self, id: &str) -> PanelResult<()> {
        self.remove(Collection::Exams, id).await
    }

    // ------------------------------------------------------------------
    // Blogs
    // ------------------------------------------------------------------

    pub async fn create_blog(&self, form: &BlogForm) -> PanelResult<String> {
        let post: BlogPost = form.build(now_millis())?;
        let _ticket = self.guard.acquire(BLOG_CREATE_KEY)?;
        self.insert_entity(&post, UploadBatch::default()).await
    }

    pub async fn update_blog(&self, current: &BlogPost, edit: &BlogEdit) -> PanelResult<()> {
        let _ticket = self.guard.acquire(&blog_update_key(&current.id))?;
        self.apply_patch(Collection::Blogs, &current.id, edit.patch(current))
            .await
    }

    pub async fn delete_blog(&self, id: &str) -> PanelResult<()> {
        self.remove(Collection::Blogs, id).await
    }

    /// Upload an image for a blog body and return its hosted URL
    pub async fn upload_blog_image(&self, file: &UploadFile) -> PanelResult<String> {
        if !file.is_image() {
            return Err(PanelError::Validation(format!(
                "{} is not an image",
                file.file_name
            )));
        }

        let _ticket = self.guard.acquire(BLOG_IMAGE_KEY)?;
        let asset = self.uploads.upload_one(file, MediaFolder::BlogImages).await?;
        info!("Uploaded blog image {}", asset.url);
        Ok(asset.url)
    }

    /// Upload an image and return the markdown to append to the body
    pub async fn blog_image_markdown(&self, file: &UploadFile) -> PanelResult<String> {
        let url = self.upload_blog_image(file).await?;
        Ok(image_snippet(&url))
    }
}
