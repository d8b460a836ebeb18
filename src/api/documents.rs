/// Document listing, unlock and admin endpoints
///
/// Listings never carry passwords or payloads. A correct password returns
/// the payload together with a view token for `/open`.
use crate::{
    access::{self, OpenTarget, WRONG_PASSWORD},
    api::{decode_files, Created, UploadFileBody},
    auth::{AdminAuthContext, IssuedToken},
    context::AppContext,
    error::{PanelError, PanelResult},
    models::{
        Document, DocumentDraft, DocumentEdit, DocumentKind, DocumentPayload, ImageSetForm,
        InlineMarkupForm, LinkForm, PdfForm,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/documents", get(list_documents))
        .route("/api/documents/:id/unlock", post(unlock_document))
        .route("/api/documents/:id/open", get(open_document))
        .route("/api/admin/documents", post(create_document))
        .route(
            "/api/admin/documents/:id",
            patch(update_document).delete(delete_document),
        )
}

/// Public listing entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
    pub note: Option<String>,
    pub note_is_url: bool,
    pub created_at: i64,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            kind: doc.kind(),
            note: doc.note.clone(),
            note_is_url: doc.note_is_url(),
            created_at: doc.created_at,
        }
    }
}

async fn list_documents(State(ctx): State<AppContext>) -> Json<Vec<DocumentSummary>> {
    let docs = ctx.sync.documents();
    Json(docs.iter().map(DocumentSummary::from).collect())
}

fn find_document(ctx: &AppContext, id: &str) -> PanelResult<Document> {
    ctx.sync
        .document(id)
        .ok_or_else(|| PanelError::NotFound(format!("Document {}", id)))
}

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    /// Same-origin URL that opens the document
    pub open_url: String,
    #[serde(flatten)]
    pub token: IssuedToken,
    /// Hosted or external URL for pdf and link documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Ordered pages of an image set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

/// Check a document password and hand out its payload
async fn unlock_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<UnlockRequest>,
) -> PanelResult<Json<UnlockResponse>> {
    // Only known documents get a limiter key
    let doc = find_document(&ctx, &id)?;
    ctx.limiter.check_unlock(&doc.id)?;

    if !doc.password_matches(&req.password) {
        tracing::debug!("Wrong password for document {}", id);
        return Err(PanelError::AccessDenied(WRONG_PASSWORD.to_string()));
    }

    let token = ctx.gate.issue_view_token(&doc)?;
    let (url, image_urls) = match &doc.payload {
        DocumentPayload::InlineMarkup { .. } => (None, None),
        DocumentPayload::ExternalLink { url } => (Some(url.clone()), None),
        DocumentPayload::Pdf { pdf_url } => (Some(pdf_url.clone()), None),
        DocumentPayload::ImageSet { image_urls } => (None, Some(image_urls.clone())),
    };

    Ok(Json(UnlockResponse {
        summary: DocumentSummary::from(&doc),
        open_url: format!("/api/documents/{}/open?token={}", doc.id, token.token),
        token,
        url,
        image_urls,
    }))
}

#[derive(Debug, Deserialize)]
pub struct OpenQuery {
    pub token: String,
}

/// Serve inline markup, or redirect to the stored URL
async fn open_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<OpenQuery>,
) -> PanelResult<Response> {
    let doc = find_document(&ctx, &id)?;
    ctx.gate.verify_view_token(&query.token, &doc)?;

    Ok(match access::open_target(&doc)? {
        OpenTarget::InlineMarkup(content) => Html(content).into_response(),
        OpenTarget::Url(url) => Redirect::temporary(&url).into_response(),
    })
}

// ============================================================================
// Admin
// ============================================================================

/// New document, tagged by kind
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum CreateDocumentRequest {
    #[serde(rename = "html")]
    InlineMarkup {
        file: UploadFileBody,
        password: String,
        #[serde(default)]
        note: String,
    },
    #[serde(rename = "pdf")]
    Pdf {
        file: UploadFileBody,
        password: String,
        #[serde(default)]
        note: String,
    },
    #[serde(rename = "url")]
    ExternalLink {
        name: String,
        url: String,
        password: String,
        #[serde(default)]
        note: String,
    },
    #[serde(rename = "images")]
    ImageSet {
        #[serde(default)]
        name: String,
        files: Vec<UploadFileBody>,
        password: String,
        #[serde(default)]
        note: String,
    },
}

impl CreateDocumentRequest {
    /// Fill the matching form, applying its file admission rules
    pub fn into_draft(self) -> PanelResult<DocumentDraft> {
        Ok(match self {
            CreateDocumentRequest::InlineMarkup { file, password, note } => {
                let mut form = InlineMarkupForm {
                    password,
                    note,
                    ..Default::default()
                };
                form.load_file(file.decode()?)?;
                DocumentDraft::InlineMarkup(form)
            }
            CreateDocumentRequest::Pdf { file, password, note } => {
                let mut form = PdfForm {
                    file: None,
                    password,
                    note,
                };
                form.pick(file.decode()?)?;
                DocumentDraft::Pdf(form)
            }
            CreateDocumentRequest::ExternalLink {
                name,
                url,
                password,
                note,
            } => DocumentDraft::ExternalLink(LinkForm {
                name,
                url,
                password,
                note,
            }),
            CreateDocumentRequest::ImageSet {
                name,
                files,
                password,
                note,
            } => {
                let mut form = ImageSetForm {
                    name,
                    files: Vec::new(),
                    password,
                    note,
                };
                form.pick(decode_files(files)?)?;
                DocumentDraft::ImageSet(form)
            }
        })
    }
}

async fn create_document(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Json(req): Json<CreateDocumentRequest>,
) -> PanelResult<(StatusCode, Json<Created>)> {
    let draft = req.into_draft()?;
    let id = ctx.service.create_document(&draft).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Fields to change; omitted fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub note: Option<String>,
    pub url: Option<String>,
}

impl UpdateDocumentRequest {
    pub fn into_edit(self, current: &Document) -> DocumentEdit {
        let mut edit = DocumentEdit::from_document(current);
        if let Some(name) = self.name {
            edit.name = name;
        }
        if let Some(password) = self.password {
            edit.password = password;
        }
        if let Some(note) = self.note {
            edit.note = note;
        }
        if let Some(url) = self.url {
            edit.url = url;
        }
        edit
    }
}

async fn update_document(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> PanelResult<StatusCode> {
    let current = find_document(&ctx, &id)?;
    let edit = req.into_edit(&current);
    ctx.service.update_document(&current, &edit).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_document(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
) -> PanelResult<StatusCode> {
    ctx.service.delete_document(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
