/// Media hosting
///
/// Binary assets (PDFs, image-set pages, exam scans, blog images) are pushed
/// to a media host that hands back a public URL. Backends implement
/// [`MediaHost`]; [`UploadPipeline`] drives them for multi-file saves.

pub mod cloudinary;
pub mod disk;
pub mod pipeline;

pub use cloudinary::CloudinaryHost;
pub use disk::DiskMediaHost;
pub use pipeline::{UploadBatch, UploadPipeline};

use crate::error::{PanelError, PanelResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A local file picked for upload
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(file_name: &str, content_type: Option<&str>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.map(String::from),
            data,
        }
    }

    /// Declared content type, or one sniffed from the bytes
    pub fn mime_type(&self) -> String {
        if let Some(ct) = self.content_type.as_deref().filter(|ct| !ct.is_empty()) {
            return ct.to_string();
        }
        if self.data.starts_with(b"%PDF-") {
            return "application/pdf".to_string();
        }
        match image::guess_format(&self.data) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) => "application/octet-stream".to_string(),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type() == "application/pdf"
    }

    pub fn is_image(&self) -> bool {
        self.mime_type().starts_with("image/")
    }
}

/// Destination folder on the media host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaFolder {
    Pdfs,
    ImageDocs,
    ExamImages,
    BlogImages,
}

impl MediaFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::Pdfs => "pdfs",
            MediaFolder::ImageDocs => "imageDocs",
            MediaFolder::ExamImages => "examImages",
            MediaFolder::BlogImages => "blogImages",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pdfs" => Some(MediaFolder::Pdfs),
            "imageDocs" => Some(MediaFolder::ImageDocs),
            "examImages" => Some(MediaFolder::ExamImages),
            "blogImages" => Some(MediaFolder::BlogImages),
            _ => None,
        }
    }
}

/// A file now living on the media host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedAsset {
    pub url: String,
    /// Backend-specific handle allowing the asset to be removed again
    pub discard_token: Option<String>,
}

/// Media host backend
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Upload one file into `folder` and return its hosted URL
    async fn upload(&self, file: &UploadFile, folder: MediaFolder) -> PanelResult<HostedAsset>;

    /// Remove a previously uploaded asset
    async fn discard(&self, asset: &HostedAsset) -> PanelResult<()>;
}

/// PDF documents only accept PDFs
pub fn admit_pdf(file: &UploadFile) -> PanelResult<()> {
    if file.is_pdf() {
        Ok(())
    } else {
        Err(PanelError::Validation(format!(
            "{} is not a PDF (.pdf) file",
            file.file_name
        )))
    }
}

/// Keep the image files of a pick, rejecting it when none remain
pub fn admit_images(files: Vec<UploadFile>) -> PanelResult<Vec<UploadFile>> {
    let picked = files.len();
    let images: Vec<UploadFile> = files.into_iter().filter(UploadFile::is_image).collect();

    if images.is_empty() {
        return Err(PanelError::Validation(
            "Only image files (jpg, png, webp, ...) are supported".to_string(),
        ));
    }

    if images.len() < picked {
        tracing::debug!("Dropped {} non-image files from pick", picked - images.len());
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn test_mime_type_sniffing() {
        let pdf = UploadFile::new("a.pdf", None, b"%PDF-1.7 ...".to_vec());
        assert!(pdf.is_pdf());

        let png = UploadFile::new("a.png", None, PNG_MAGIC.to_vec());
        assert_eq!(png.mime_type(), "image/png");
        assert!(png.is_image());

        let declared = UploadFile::new("a.bin", Some("image/webp"), vec![0]);
        assert!(declared.is_image());

        let unknown = UploadFile::new("a.txt", None, b"hello".to_vec());
        assert_eq!(unknown.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_admit_pdf() {
        assert!(admit_pdf(&UploadFile::new("a.pdf", Some("application/pdf"), vec![])).is_ok());
        assert!(admit_pdf(&UploadFile::new("a.png", Some("image/png"), vec![])).is_err());
    }

    #[test]
    fn test_admit_images_filters() {
        let files = vec![
            UploadFile::new("a.png", Some("image/png"), vec![1]),
            UploadFile::new("notes.txt", Some("text/plain"), vec![2]),
            UploadFile::new("b.jpg", Some("image/jpeg"), vec![3]),
        ];
        let admitted = admit_images(files).unwrap();
        let names: Vec<_> = admitted.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);

        let rejected = admit_images(vec![UploadFile::new("x.txt", Some("text/plain"), vec![])]);
        assert!(rejected.is_err());
    }

    #[test]
    fn test_folder_names() {
        for folder in [
            MediaFolder::Pdfs,
            MediaFolder::ImageDocs,
            MediaFolder::ExamImages,
            MediaFolder::BlogImages,
        ] {
            assert_eq!(MediaFolder::parse(folder.as_str()), Some(folder));
        }
        assert_eq!(MediaFolder::parse("../etc"), None);
    }
}
