/// Headless panel session
///
/// One visitor's view of the panel: live collections, the selected document
/// and its unlock state, exam and blog browsing, the admin session and the
/// open edit forms. Renderers drive it and read its state back.
use crate::{
    access::{DocumentViewer, OpenTarget, PageDirection, ScrollCommand, Viewport},
    auth::AdminGate,
    browse::{group_exams, tag_universe, BlogBrowser, ExamBrowser, ExamGroups},
    compose::{Composer, ToolbarAction},
    error::{PanelError, PanelResult},
    media::UploadFile,
    models::{
        BlogEdit, BlogForm, BlogPost, Collection, Document, DocumentDraft, DocumentEdit, Exam,
        ExamEdit, ExamForm,
    },
    service::{PanelService, BLOG_CREATE_KEY},
    sync::{ContentSync, RetryPolicy, SyncEvent, SyncStatus},
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Open edit form and the id of the record it edits
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession<T> {
    pub id: String,
    pub form: T,
}

/// Blog creation form; the body lives in the composer
#[derive(Debug, Clone, Default)]
pub struct BlogDraft {
    pub title: String,
    pub tags_input: String,
    pub composer: Composer,
}

pub struct Panel {
    sync: ContentSync,
    events: broadcast::Receiver<SyncEvent>,
    service: PanelService,
    gate: Arc<AdminGate>,
    admin_token: Option<String>,
    pub login_input: String,
    login_error: Option<String>,
    viewer: DocumentViewer,
    exam_browser: ExamBrowser,
    blog_browser: BlogBrowser,
    pub blog_draft: BlogDraft,
    document_edit: Option<EditSession<DocumentEdit>>,
    exam_edit: Option<EditSession<ExamEdit>>,
    blog_edit: Option<EditSession<BlogEdit>>,
    viewport: Viewport,
}

impl Panel {
    /// Start a session with live subscriptions to every collection
    pub fn mount(service: PanelService, gate: Arc<AdminGate>, retry: RetryPolicy) -> Self {
        let sync = ContentSync::mount(service.store().clone(), retry);
        let events = sync.events();
        Self {
            sync,
            events,
            service,
            gate,
            admin_token: None,
            login_input: String::new(),
            login_error: None,
            viewer: DocumentViewer::default(),
            exam_browser: ExamBrowser::default(),
            blog_browser: BlogBrowser::default(),
            blog_draft: BlogDraft::default(),
            document_edit: None,
            exam_edit: None,
            blog_edit: None,
            viewport: Viewport::default(),
        }
    }

    /// End the session and release its subscriptions
    pub fn unmount(self) {
        self.sync.unmount();
    }

    pub fn sync(&self) -> &ContentSync {
        &self.sync
    }

    pub fn status(&self, collection: Collection) -> SyncStatus {
        self.sync.status(collection)
    }

    /// Wait for the next snapshot or status change and drop selections it removed
    pub async fn next_change(&mut self) -> PanelResult<SyncEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.reconcile();
                    return Ok(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Panel skipped {} sync events", skipped);
                }
                Err(RecvError::Closed) => {
                    return Err(PanelError::Subscription("Sync stopped".to_string()));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Admin session
    // ------------------------------------------------------------------

    pub fn is_admin(&self) -> bool {
        self.admin_token
            .as_deref()
            .map(|token| self.gate.verify_admin(token).is_ok())
            .unwrap_or(false)
    }

    pub fn login_error(&self) -> Option<&str> {
        self.login_error.as_deref()
    }

    /// Check the typed admin password; the input is kept on failure
    pub fn login(&mut self) -> PanelResult<()> {
        match self.gate.login(&self.login_input) {
            Ok(issued) => {
                self.admin_token = Some(issued.token);
                self.login_error = None;
                self.login_input.clear();
                Ok(())
            }
            Err(e) => {
                self.login_error = Some("Wrong admin password".to_string());
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.admin_token = None;
        self.document_edit = None;
        self.exam_edit = None;
        self.blog_edit = None;
    }

    fn require_admin(&self) -> PanelResult<()> {
        let token = self
            .admin_token
            .as_deref()
            .ok_or_else(|| PanelError::Authentication("Admin login required".to_string()))?;
        self.gate.verify_admin(token)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub fn documents(&self) -> Arc<Vec<Document>> {
        self.sync.documents()
    }

    pub fn viewer(&self) -> &DocumentViewer {
        &self.viewer
    }

    pub fn select_document(&mut self, id: &str) {
        self.viewer.select(id);
    }

    pub fn selected_document(&self) -> Option<Document> {
        self.viewer.selected().and_then(|id| self.sync.document(id))
    }

    fn selected_or_missing(&self) -> PanelResult<Document> {
        self.selected_document()
            .ok_or_else(|| PanelError::NotFound("No document selected".to_string()))
    }

    /// Submit a password for the selected document
    pub fn unlock(&mut self, password: &str) -> PanelResult<()> {
        let doc = self.selected_or_missing()?;
        self.viewer.set_password_input(password);
        self.viewer.submit(&doc)
    }

    pub fn open_selected(&self) -> PanelResult<OpenTarget> {
        let doc = self.selected_or_missing()?;
        self.viewer.open_target(&doc)
    }

    pub fn toggle_full_view(&mut self) {
        self.viewer.toggle_full_view();
    }

    pub fn zoom_in(&mut self) {
        self.viewer.strip_mut().zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewer.strip_mut().zoom_out();
    }

    pub fn reset_zoom(&mut self) {
        self.viewer.strip_mut().reset_zoom();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn page_images(&mut self, direction: PageDirection, content_width: f64) -> Option<ScrollCommand> {
        let viewport = self.viewport;
        self.viewer.strip_mut().page(direction, viewport, content_width)
    }

    pub async fn create_document(&self, draft: &DocumentDraft) -> PanelResult<String> {
        self.require_admin()?;
        self.service.create_document(draft).await
    }

    pub fn start_document_edit(&mut self, id: &str) -> PanelResult<()> {
        self.require_admin()?;
        let doc = self
            .sync
            .document(id)
            .ok_or_else(|| PanelError::NotFound(format!("Document {}", id)))?;
        self.document_edit = Some(EditSession {
            id: doc.id.clone(),
            form: DocumentEdit::from_document(&doc),
        });
        Ok(())
    }

    pub fn document_edit_mut(&mut self) -> Option<&mut DocumentEdit> {
        self.document_edit.as_mut().map(|session| &mut session.form)
    }

    pub fn cancel_document_edit(&mut self) {
        self.document_edit = None;
    }

    /// Save the open document edit; the form stays open on failure
    pub async fn save_document_edit(&mut self) -> PanelResult<()> {
        self.require_admin()?;
        let session = self
            .document_edit
            .as_ref()
            .ok_or_else(|| PanelError::Validation("No document is being edited".to_string()))?;
        let current = self
            .sync
            .document(&session.id)
            .ok_or_else(|| PanelError::NotFound(format!("Document {}", session.id)))?;

        self.service.update_document(&current, &session.form).await?;
        self.document_edit = None;
        Ok(())
    }

    pub async fn delete_document(&mut self, id: &str) -> PanelResult<()> {
        self.require_admin()?;
        self.service.delete_document(id).await?;

        if self.viewer.selected() == Some(id) {
            self.viewer.clear();
        }
        if self.document_edit.as_ref().map(|s| s.id.as_str()) == Some(id) {
            self.document_edit = None;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Exams
    // ------------------------------------------------------------------

    pub fn exams(&self) -> Arc<Vec<Exam>> {
        self.sync.exams()
    }

    pub fn exam_groups(&self) -> ExamGroups {
        group_exams(&self.sync.exams())
    }

    pub fn open_exam(&self) -> Option<&str> {
        self.exam_browser.open_id()
    }

    pub fn toggle_exam(&mut self, id: &str) {
        self.exam_browser.toggle(id);
    }

    pub async fn create_exam(&self, form: &ExamForm) -> PanelResult<String> {
        self.require_admin()?;
        self.service.create_exam(form).await
    }

    pub fn start_exam_edit(&mut self, id: &str) -> PanelResult<()> {
        self.require_admin()?;
        let exam = self
            .sync
            .exam(id)
            .ok_or_else(|| PanelError::NotFound(format!("Exam {}", id)))?;
        self.exam_edit = Some(EditSession {
            id: exam.id.clone(),
            form: ExamEdit::from_exam(&exam),
        });
        Ok(())
    }

    pub fn exam_edit_mut(&mut self) -> Option<&mut ExamEdit> {
        self.exam_edit.as_mut().map(|session| &mut session.form)
    }

    pub fn cancel_exam_edit(&mut self) {
        self.exam_edit = None;
    }

    pub async fn save_exam_edit(&mut self) -> PanelResult<()> {
        self.require_admin()?;
        let session = self
            .exam_edit
            .as_ref()
            .ok_or_else(|| PanelError::Validation("No exam is being edited".to_string()))?;
        let current = self
            .sync
            .exam(&session.id)
            .ok_or_else(|| PanelError::NotFound(format!("Exam {}", session.id)))?;

        self.service.update_exam(&current, &session.form).await?;
        self.exam_edit = None;
        Ok(())
    }

    pub async fn delete_exam(&mut self, id: &str) -> PanelResult<()> {
        self.require_admin()?;
        self.service.delete_exam(id).await?;

        if self.exam_browser.open_id() == Some(id) {
            self.exam_browser.close();
        }
        if self.exam_edit.as_ref().map(|s| s.id.as_str()) == Some(id) {
            self.exam_edit = None;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Blogs
    // ------------------------------------------------------------------

    pub fn blog_browser(&self) -> &BlogBrowser {
        &self.blog_browser
    }

    pub fn set_blog_search(&mut self, search: &str) {
        self.blog_browser.search = search.to_string();
    }

    pub fn select_tag(&mut self, tag: &str) {
        self.blog_browser.select_tag(tag);
    }

    pub fn clear_tag(&mut self) {
        self.blog_browser.clear_tag();
    }

    pub fn tags(&self) -> Vec<String> {
        tag_universe(&self.sync.blogs())
    }

    /// Posts matching the search box and tag chip
    pub fn visible_blogs(&self) -> Vec<BlogPost> {
        let posts = self.sync.blogs();
        self.blog_browser
            .visible(&posts)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn open_post(&mut self, id: &str) {
        self.blog_browser.open_post(id);
    }

    pub fn back_to_list(&mut self) {
        self.blog_browser.back_to_list();
    }

    pub fn active_post(&self) -> Option<BlogPost> {
        self.blog_browser
            .active_post()
            .and_then(|id| self.sync.blog(id))
    }

    pub fn apply_toolbar(&mut self, action: ToolbarAction) {
        self.blog_draft.composer.apply(action);
    }

    pub fn can_submit_blog(&self) -> bool {
        let form = self.blog_form();
        form.is_submittable() && self.service.can_submit(BLOG_CREATE_KEY)
    }

    fn blog_form(&self) -> BlogForm {
        BlogForm {
            title: self.blog_draft.title.clone(),
            content: self.blog_draft.composer.buffer().to_string(),
            tags_input: self.blog_draft.tags_input.clone(),
        }
    }

    /// Upload an image and append it to the blog body
    pub async fn insert_blog_image(&mut self, file: &UploadFile) -> PanelResult<()> {
        self.require_admin()?;
        self.blog_draft.composer.begin_image_upload()?;

        match self.service.upload_blog_image(file).await {
            Ok(url) => {
                self.blog_draft.composer.finish_image_upload(Some(&url));
                Ok(())
            }
            Err(e) => {
                self.blog_draft.composer.finish_image_upload(None);
                Err(e)
            }
        }
    }

    /// Save the blog draft; cleared only on success
    pub async fn create_blog(&mut self) -> PanelResult<String> {
        self.require_admin()?;
        let id = self.service.create_blog(&self.blog_form()).await?;
        self.blog_draft = BlogDraft::default();
        Ok(id)
    }

    pub fn start_blog_edit(&mut self, id: &str) -> PanelResult<()> {
        self.require_admin()?;
        let post = self
            .sync
            .blog(id)
            .ok_or_else(|| PanelError::NotFound(format!("Blog post {}", id)))?;
        self.blog_edit = Some(EditSession {
            id: post.id.clone(),
            form: BlogEdit::from_post(&post),
        });
        Ok(())
    }

    pub fn blog_edit_mut(&mut self) -> Option<&mut BlogEdit> {
        self.blog_edit.as_mut().map(|session| &mut session.form)
    }

    pub fn cancel_blog_edit(&mut self) {
        self.blog_edit = None;
    }

    pub async fn save_blog_edit(&mut self) -> PanelResult<()> {
        self.require_admin()?;
        let session = self
            .blog_edit
            .as_ref()
            .ok_or_else(|| PanelError::Validation("No blog post is being edited".to_string()))?;
        let current = self
            .sync
            .blog(&session.id)
            .ok_or_else(|| PanelError::NotFound(format!("Blog post {}", session.id)))?;

        self.service.update_blog(&current, &session.form).await?;
        self.blog_edit = None;
        Ok(())
    }

    pub async fn delete_blog(&mut self, id: &str) -> PanelResult<()> {
        self.require_admin()?;
        self.service.delete_blog(id).await?;

        if self.blog_browser.active_post() == Some(id) {
            self.blog_browser.back_to_list();
        }
        if self.blog_edit.as_ref().map(|s| s.id.as_str()) == Some(id) {
            self.blog_edit = None;
        }
        Ok(())
    }

    /// Drop selections whose records vanished from the latest snapshots
    pub fn reconcile(&mut self) {
        if let Some(id) = self.viewer.selected() {
            if self.sync.document(id).is_none() {
                self.viewer.clear();
            }
        }
        if let Some(id) = self.exam_browser.open_id() {
            if self.sync.exam(id).is_none() {
                self.exam_browser.close();
            }
        }
        if let Some(id) = self.blog_browser.active_post() {
            if self.sync.blog(id).is_none() {
                self.blog_browser.back_to_list();
            }
        }
    }
}
