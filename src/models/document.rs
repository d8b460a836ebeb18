/// Password-gated documents
use crate::{
    error::{PanelError, PanelResult},
    media::{self, MediaFolder, UploadFile},
    models::{non_empty, Collection, Entity},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document kind, as stored in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "html")]
    InlineMarkup,
    #[serde(rename = "url")]
    ExternalLink,
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "images")]
    ImageSet,
}

/// Kind-specific payload. Exactly one is present and it always matches the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DocumentPayload {
    #[serde(rename = "html")]
    InlineMarkup { content: String },
    #[serde(rename = "url")]
    ExternalLink { url: String },
    #[serde(rename = "pdf")]
    Pdf {
        #[serde(rename = "pdfUrl")]
        pdf_url: String,
    },
    #[serde(rename = "images")]
    ImageSet {
        #[serde(rename = "imageUrls")]
        image_urls: Vec<String>,
    },
}

impl DocumentPayload {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentPayload::InlineMarkup { .. } => DocumentKind::InlineMarkup,
            DocumentPayload::ExternalLink { .. } => DocumentKind::ExternalLink,
            DocumentPayload::Pdf { .. } => DocumentKind::Pdf,
            DocumentPayload::ImageSet { .. } => DocumentKind::ImageSet,
        }
    }
}

/// Document record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub payload: DocumentPayload,
    pub password: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl Entity for Document {
    const COLLECTION: Collection = Collection::Documents;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        self.payload.kind()
    }

    /// Exact string comparison, no trimming or normalization
    pub fn password_matches(&self, input: &str) -> bool {
        input == self.password
    }

    /// Whether the note should render as a link
    pub fn note_is_url(&self) -> bool {
        self.note.as_deref().map(is_probably_url).unwrap_or(false)
    }
}

/// `http://` or `https://` prefix, case-insensitive, after trimming
pub fn is_probably_url(text: &str) -> bool {
    let text = text.trim();
    ["http://", "https://"].iter().any(|prefix| {
        text.len() >= prefix.len()
            && text.is_char_boundary(prefix.len())
            && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    })
}

// ============================================================================
// Create forms
// ============================================================================

/// Inline HTML snippet loaded from a local file
#[derive(Debug, Clone, Default)]
pub struct InlineMarkupForm {
    pub file_name: String,
    pub content: String,
    pub password: String,
    pub note: String,
}

impl InlineMarkupForm {
    /// Load the picked file as UTF-8 text
    pub fn load_file(&mut self, file: UploadFile) -> PanelResult<()> {
        let content = String::from_utf8(file.data).map_err(|_| {
            PanelError::Validation(format!("{} is not UTF-8 text", file.file_name))
        })?;
        self.file_name = file.file_name;
        self.content = content;
        Ok(())
    }

    pub fn is_submittable(&self) -> bool {
        !self.file_name.is_empty() && !self.password.trim().is_empty()
    }
}

/// PDF uploaded to the media host
#[derive(Debug, Clone, Default)]
pub struct PdfForm {
    pub file: Option<UploadFile>,
    pub password: String,
    pub note: String,
}

impl PdfForm {
    /// Accept the picked file only if it is a PDF
    pub fn pick(&mut self, file: UploadFile) -> PanelResult<()> {
        media::admit_pdf(&file)?;
        self.file = Some(file);
        Ok(())
    }

    pub fn is_submittable(&self) -> bool {
        self.file.is_some() && !self.password.trim().is_empty()
    }
}

/// External link
#[derive(Debug, Clone, Default)]
pub struct LinkForm {
    pub name: String,
    pub url: String,
    pub password: String,
    pub note: String,
}

impl LinkForm {
    pub fn is_submittable(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.url.trim().is_empty()
            && !self.password.trim().is_empty()
    }
}

/// Ordered set of images uploaded to the media host
#[derive(Debug, Clone, Default)]
pub struct ImageSetForm {
    pub name: String,
    pub files: Vec<UploadFile>,
    pub password: String,
    pub note: String,
}

impl ImageSetForm {
    /// Keep only image files; reject the pick if none remain
    pub fn pick(&mut self, files: Vec<UploadFile>) -> PanelResult<()> {
        self.files = media::admit_images(files)?;
        Ok(())
    }

    pub fn is_submittable(&self) -> bool {
        !self.files.is_empty() && !self.password.trim().is_empty()
    }

    fn resolved_name(&self) -> String {
        non_empty(&self.name)
            .or_else(|| self.files.first().map(|f| f.file_name.clone()))
            .unwrap_or_else(|| {
                format!(
                    "Image set {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
                )
            })
    }
}

/// One document creation form per kind
#[derive(Debug, Clone)]
pub enum DocumentDraft {
    InlineMarkup(InlineMarkupForm),
    Pdf(PdfForm),
    ExternalLink(LinkForm),
    ImageSet(ImageSetForm),
}

impl DocumentDraft {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentDraft::InlineMarkup(_) => DocumentKind::InlineMarkup,
            DocumentDraft::Pdf(_) => DocumentKind::Pdf,
            DocumentDraft::ExternalLink(_) => DocumentKind::ExternalLink,
            DocumentDraft::ImageSet(_) => DocumentKind::ImageSet,
        }
    }

    /// Required fields present
    pub fn is_submittable(&self) -> bool {
        match self {
            DocumentDraft::InlineMarkup(form) => form.is_submittable(),
            DocumentDraft::Pdf(form) => form.is_submittable(),
            DocumentDraft::ExternalLink(form) => form.is_submittable(),
            DocumentDraft::ImageSet(form) => form.is_submittable(),
        }
    }

    /// Key identifying this form for duplicate-submission tracking
    pub fn form_key(&self) -> String {
        let kind = match self.kind() {
            DocumentKind::InlineMarkup => "html",
            DocumentKind::ExternalLink => "url",
            DocumentKind::Pdf => "pdf",
            DocumentKind::ImageSet => "images",
        };
        format!("documents.create.{}", kind)
    }

    /// Files that must be uploaded before the record is written
    pub fn uploads(&self) -> (Vec<&UploadFile>, MediaFolder) {
        match self {
            DocumentDraft::Pdf(form) => (form.file.iter().collect(), MediaFolder::Pdfs),
            DocumentDraft::ImageSet(form) => (form.files.iter().collect(), MediaFolder::ImageDocs),
            DocumentDraft::InlineMarkup(_) | DocumentDraft::ExternalLink(_) => {
                (Vec::new(), MediaFolder::Pdfs)
            }
        }
    }

    /// Build the record once every upload has a hosted URL
    pub fn build(&self, hosted_urls: Vec<String>, created_at: i64) -> PanelResult<Document> {
        if !self.is_submittable() {
            return Err(PanelError::Validation(
                "Required document fields are empty".to_string(),
            ));
        }

        let (name, payload, password, note) = match self {
            DocumentDraft::InlineMarkup(form) => (
                form.file_name.clone(),
                DocumentPayload::InlineMarkup {
                    content: form.content.clone(),
                },
                &form.password,
                &form.note,
            ),
            DocumentDraft::Pdf(form) => {
                let file_name = form
                    .file
                    .as_ref()
                    .map(|f| f.file_name.clone())
                    .unwrap_or_default();
                let pdf_url = hosted_urls.into_iter().next().ok_or_else(|| {
                    PanelError::Internal("PDF saved without a hosted URL".to_string())
                })?;
                (
                    file_name,
                    DocumentPayload::Pdf { pdf_url },
                    &form.password,
                    &form.note,
                )
            }
            DocumentDraft::ExternalLink(form) => (
                form.name.trim().to_string(),
                DocumentPayload::ExternalLink {
                    url: form.url.trim().to_string(),
                },
                &form.password,
                &form.note,
            ),
            DocumentDraft::ImageSet(form) => {
                if hosted_urls.len() != form.files.len() {
                    return Err(PanelError::Internal(format!(
                        "Image set has {} files but {} hosted URLs",
                        form.files.len(),
                        hosted_urls.len()
                    )));
                }
                (
                    form.resolved_name(),
                    DocumentPayload::ImageSet {
                        image_urls: hosted_urls,
                    },
                    &form.password,
                    &form.note,
                )
            }
        };

        Ok(Document {
            id: String::new(),
            name,
            payload,
            password: password.trim().to_string(),
            note: non_empty(note),
            created_at,
        })
    }
}

// ============================================================================
// Edit form
// ============================================================================

/// Editable document fields. Kind and payload are fixed, except a link's URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentEdit {
    pub name: String,
    pub password: String,
    pub note: String,
    pub url: String,
}

impl DocumentEdit {
    /// Prefill from the current record
    pub fn from_document(doc: &Document) -> Self {
        Self {
            name: doc.name.clone(),
            password: doc.password.clone(),
            note: doc.note.clone().unwrap_or_default(),
            url: match &doc.payload {
                DocumentPayload::ExternalLink { url } => url.clone(),
                _ => String::new(),
            },
        }
    }

    /// Partial update relative to `current`.
    ///
    /// Empty or unchanged name/password are left alone; the note is always
    /// written (null when empty).
    pub fn patch(&self, current: &Document) -> Map<String, Value> {
        let mut patch = Map::new();

        if let Some(name) = non_empty(&self.name) {
            if name != current.name {
                patch.insert("name".into(), Value::String(name));
            }
        }

        if let Some(password) = non_empty(&self.password) {
            if password != current.password {
                patch.insert("password".into(), Value::String(password));
            }
        }

        patch.insert(
            "note".into(),
            non_empty(&self.note).map(Value::String).unwrap_or(Value::Null),
        );

        if let DocumentPayload::ExternalLink { url } = &current.payload {
            if let Some(new_url) = non_empty(&self.url) {
                if &new_url != url {
                    patch.insert("url".into(), Value::String(new_url));
                }
            }
        }

        patch
    }
}
