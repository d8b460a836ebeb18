/// Document access control and image-set viewing
use crate::{
    error::{PanelError, PanelResult},
    models::{Document, DocumentPayload},
};
use serde::Serialize;

pub const WRONG_PASSWORD: &str = "Wrong password, please try again.";

/// Viewports narrower than this use the paged layout
pub const NARROW_BREAKPOINT: f64 = 768.0;

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.25;
pub const DEFAULT_ZOOM: f64 = 1.0;

const NARROW_PAGE_FRACTION: f64 = 0.3;
const WIDE_SCROLL_FRACTION: f64 = 0.6;

/// Unlock state of the selected document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AccessState {
    Locked {
        password_input: String,
        error: Option<String>,
    },
    Unlocked,
}

impl Default for AccessState {
    fn default() -> Self {
        AccessState::Locked {
            password_input: String::new(),
            error: None,
        }
    }
}

/// Where an unlocked document opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenTarget {
    /// Markup served from the panel's own origin
    InlineMarkup(String),
    /// Hosted or external URL
    Url(String),
}

/// Resolve the payload a document opens to
pub fn open_target(doc: &Document) -> PanelResult<OpenTarget> {
    match &doc.payload {
        DocumentPayload::InlineMarkup { content } => Ok(OpenTarget::InlineMarkup(content.clone())),
        DocumentPayload::ExternalLink { url } => Ok(OpenTarget::Url(url.clone())),
        DocumentPayload::Pdf { pdf_url } => Ok(OpenTarget::Url(pdf_url.clone())),
        DocumentPayload::ImageSet { image_urls } => image_urls
            .first()
            .cloned()
            .map(OpenTarget::Url)
            .ok_or_else(|| PanelError::NotFound(format!("Image set {} has no images", doc.id))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Narrow,
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280.0 }
    }
}

impl Viewport {
    pub fn layout(&self) -> Layout {
        if self.width < NARROW_BREAKPOINT {
            Layout::Narrow
        } else {
            Layout::Wide
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Previous,
    Next,
}

/// Scroll the renderer must perform on the wide layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ScrollCommand {
    SmoothScrollBy(f64),
}

/// Zoom and pan of an image set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageStrip {
    zoom: f64,
    offset: f64,
}

impl Default for ImageStrip {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            offset: 0.0,
        }
    }
}

impl ImageStrip {
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Horizontal translation on the narrow layout, always <= 0
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom - ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = DEFAULT_ZOOM;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Move one page. Narrow layouts pan locally; wide layouts ask for a scroll.
    pub fn page(&mut self, direction: PageDirection, viewport: Viewport, content_width: f64) -> Option<ScrollCommand> {
        match viewport.layout() {
            Layout::Narrow => {
                if content_width <= viewport.width {
                    return None;
                }
                let step = viewport.width * NARROW_PAGE_FRACTION;
                let min_offset = -(content_width - viewport.width);
                let moved = match direction {
                    PageDirection::Previous => self.offset + step,
                    PageDirection::Next => self.offset - step,
                };
                self.offset = moved.clamp(min_offset, 0.0);
                None
            }
            Layout::Wide => {
                let amount = viewport.width * WIDE_SCROLL_FRACTION;
                Some(ScrollCommand::SmoothScrollBy(match direction {
                    PageDirection::Previous => -amount,
                    PageDirection::Next => amount,
                }))
            }
        }
    }
}

/// Selection, unlock state and view options of the document panel
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentViewer {
    selected: Option<String>,
    state: AccessState,
    full_view: bool,
    strip: ImageStrip,
}

impl DocumentViewer {
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn state(&self) -> &AccessState {
        &self.state
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.state, AccessState::Unlocked)
    }

    pub fn full_view(&self) -> bool {
        self.full_view
    }

    pub fn strip(&self) -> &ImageStrip {
        &self.strip
    }

    pub fn strip_mut(&mut self) -> &mut ImageStrip {
        &mut self.strip
    }

    /// Select a document; always starts locked with a fresh view
    pub fn select(&mut self, doc_id: &str) {
        self.selected = Some(doc_id.to_string());
        self.state = AccessState::default();
        self.full_view = false;
        self.strip.reset();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Typing a new password re-locks the document until it is submitted
    pub fn set_password_input(&mut self, input: &str) {
        match &mut self.state {
            AccessState::Locked { password_input, .. } => *password_input = input.to_string(),
            AccessState::Unlocked => {
                self.state = AccessState::Locked {
                    password_input: input.to_string(),
                    error: None,
                };
                self.full_view = false;
            }
        }
    }

    /// Check the typed password against the selected document
    pub fn submit(&mut self, doc: &Document) -> PanelResult<()> {
        if self.selected.as_deref() != Some(doc.id.as_str()) {
            return Err(PanelError::Validation(format!(
                "Document {} is not selected",
                doc.id
            )));
        }

        let AccessState::Locked { password_input, error } = &mut self.state else {
            // Nothing typed since the last successful unlock
            return Ok(());
        };

        if doc.password_matches(password_input) {
            tracing::debug!("Unlocked document {}", doc.id);
            self.state = AccessState::Unlocked;
            Ok(())
        } else {
            *error = Some(WRONG_PASSWORD.to_string());
            Err(PanelError::AccessDenied(WRONG_PASSWORD.to_string()))
        }
    }

    /// Target of the selected, unlocked document
    pub fn open_target(&self, doc: &Document) -> PanelResult<OpenTarget> {
        if self.selected.as_deref() != Some(doc.id.as_str()) || !self.is_unlocked() {
            return Err(PanelError::AccessDenied("Document is locked".to_string()));
        }
        open_target(doc)
    }

    pub fn toggle_full_view(&mut self) {
        if self.is_unlocked() {
            self.full_view = !self.full_view;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, payload: DocumentPayload) -> Document {
        Document {
            id: id.to_string(),
            name: id.to_string(),
            payload,
            password: "p1".into(),
            note: None,
            created_at: 1,
        }
    }

    fn guide() -> Document {
        doc(
            "guide",
            DocumentPayload::ExternalLink {
                url: "https://example.com/x".into(),
            },
        )
    }

    #[test]
    fn test_wrong_password_keeps_input() {
        let guide = guide();
        let mut viewer = DocumentViewer::default();
        viewer.select(&guide.id);
        viewer.set_password_input("wrong");

        assert!(matches!(viewer.submit(&guide), Err(PanelError::AccessDenied(_))));
        assert_eq!(
            viewer.state(),
            &AccessState::Locked {
                password_input: "wrong".into(),
                error: Some(WRONG_PASSWORD.into()),
            }
        );
        assert_eq!(viewer.selected(), Some("guide"));
        assert!(viewer.open_target(&guide).is_err());

        viewer.set_password_input("p1");
        viewer.submit(&guide).unwrap();
        assert_eq!(
            viewer.open_target(&guide).unwrap(),
            OpenTarget::Url("https://example.com/x".into())
        );
    }

    #[test]
    fn test_wrong_password_after_unlock_locks_again() {
        let guide = guide();
        let mut viewer = DocumentViewer::default();
        viewer.select(&guide.id);
        viewer.set_password_input("p1");
        viewer.submit(&guide).unwrap();
        viewer.toggle_full_view();
        assert!(viewer.full_view());

        viewer.set_password_input("wrong");
        assert!(matches!(viewer.submit(&guide), Err(PanelError::AccessDenied(_))));
        assert!(!viewer.is_unlocked());
        assert!(!viewer.full_view());
        assert_eq!(
            viewer.state(),
            &AccessState::Locked {
                password_input: "wrong".into(),
                error: Some(WRONG_PASSWORD.into()),
            }
        );
        assert!(viewer.open_target(&guide).is_err());

        viewer.set_password_input("p1");
        viewer.submit(&guide).unwrap();
        assert!(viewer.is_unlocked());
    }

    #[test]
    fn test_password_is_not_trimmed() {
        let guide = guide();
        let mut viewer = DocumentViewer::default();
        viewer.select(&guide.id);
        viewer.set_password_input("p1 ");
        assert!(viewer.submit(&guide).is_err());
    }

    #[test]
    fn test_selecting_resets_view() {
        let images = doc(
            "imgs",
            DocumentPayload::ImageSet {
                image_urls: vec!["https://h/1.png".into(), "https://h/2.png".into()],
            },
        );
        let mut viewer = DocumentViewer::default();
        viewer.select(&images.id);
        viewer.set_password_input("p1");
        viewer.submit(&images).unwrap();
        viewer.toggle_full_view();
        viewer.strip_mut().zoom_in();
        viewer
            .strip_mut()
            .page(PageDirection::Next, Viewport { width: 400.0 }, 2000.0);

        assert!(viewer.full_view());
        assert_eq!(
            viewer.open_target(&images).unwrap(),
            OpenTarget::Url("https://h/1.png".into())
        );

        viewer.select("other");
        assert!(!viewer.is_unlocked());
        assert!(!viewer.full_view());
        assert_eq!(viewer.strip().zoom(), DEFAULT_ZOOM);
        assert_eq!(viewer.strip().offset(), 0.0);
    }

    #[test]
    fn test_inline_markup_opens_same_origin() {
        let page = doc(
            "page",
            DocumentPayload::InlineMarkup {
                content: "<h1>Hi</h1>".into(),
            },
        );
        assert_eq!(
            open_target(&page).unwrap(),
            OpenTarget::InlineMarkup("<h1>Hi</h1>".into())
        );

        let empty = doc("empty", DocumentPayload::ImageSet { image_urls: vec![] });
        assert!(matches!(open_target(&empty), Err(PanelError::NotFound(_))));
    }

    #[test]
    fn test_zoom_is_bounded() {
        let mut strip = ImageStrip::default();
        for _ in 0..20 {
            strip.zoom_in();
        }
        assert_eq!(strip.zoom(), MAX_ZOOM);
        for _ in 0..20 {
            strip.zoom_out();
        }
        assert_eq!(strip.zoom(), MIN_ZOOM);
        strip.reset_zoom();
        assert_eq!(strip.zoom(), 1.0);
    }

    #[test]
    fn test_narrow_paging_is_clamped() {
        let viewport = Viewport { width: 500.0 };
        assert_eq!(viewport.layout(), Layout::Narrow);

        let mut strip = ImageStrip::default();
        assert_eq!(strip.page(PageDirection::Previous, viewport, 1200.0), None);
        assert_eq!(strip.offset(), 0.0);

        strip.page(PageDirection::Next, viewport, 1200.0);
        assert_eq!(strip.offset(), -150.0);

        for _ in 0..10 {
            strip.page(PageDirection::Next, viewport, 1200.0);
        }
        assert_eq!(strip.offset(), -700.0);

        // Content that fits never moves
        let mut fitting = ImageStrip::default();
        fitting.page(PageDirection::Next, viewport, 400.0);
        assert_eq!(fitting.offset(), 0.0);
    }

    #[test]
    fn test_wide_paging_scrolls() {
        let viewport = Viewport { width: 1000.0 };
        let mut strip = ImageStrip::default();
        assert_eq!(
            strip.page(PageDirection::Next, viewport, 5000.0),
            Some(ScrollCommand::SmoothScrollBy(600.0))
        );
        assert_eq!(
            strip.page(PageDirection::Previous, viewport, 5000.0),
            Some(ScrollCommand::SmoothScrollBy(-600.0))
        );
        assert_eq!(Viewport { width: 768.0 }.layout(), Layout::Wide);
    }
}
