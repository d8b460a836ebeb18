/// Disk-based media host
use crate::{
    error::{PanelError, PanelResult},
    media::{HostedAsset, MediaFolder, MediaHost, UploadFile},
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Disk storage backend
///
/// Stores files under `{base}/{folder}/{sha256}-{upload id}{.ext}` and hands
/// out URLs under `{public_url}/media/`, which the panel's router serves.
/// Every upload gets its own object, so discarding one never touches a file
/// another record points to.
#[derive(Clone)]
pub struct DiskMediaHost {
    base_path: PathBuf,
    public_url: String,
}

impl DiskMediaHost {
    pub fn new(base_path: PathBuf, public_url: &str) -> Self {
        Self {
            base_path,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Content digest plus a per-upload id, keeping a sanitized extension
    fn object_name(file: &UploadFile) -> String {
        let digest = hex::encode(Sha256::digest(&file.data));
        let stem = format!("{}-{}", digest, Uuid::new_v4().simple());
        let ext = Path::new(&file.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase());

        match ext {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        }
    }

    /// Resolve a discard token back to a path, refusing anything outside the base
    fn path_for_token(&self, token: &str) -> PanelResult<PathBuf> {
        let (folder, name) = token
            .split_once('/')
            .ok_or_else(|| PanelError::Validation(format!("Malformed media key: {}", token)))?;

        let folder = MediaFolder::parse(folder)
            .ok_or_else(|| PanelError::Validation(format!("Unknown media folder: {}", folder)))?;

        if name.is_empty()
            || name.starts_with('.')
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(PanelError::Validation(format!("Malformed media key: {}", token)));
        }

        Ok(self.base_path.join(folder.as_str()).join(name))
    }
}

#[async_trait]
impl MediaHost for DiskMediaHost {
    async fn upload(&self, file: &UploadFile, folder: MediaFolder) -> PanelResult<HostedAsset> {
        let dir = self.base_path.join(folder.as_str());
        fs::create_dir_all(&dir).await.map_err(|e| {
            PanelError::Upload(format!("Failed to create media directory: {}", e))
        })?;

        let name = Self::object_name(file);
        fs::write(dir.join(&name), &file.data).await.map_err(|e| {
            PanelError::Upload(format!("Failed to write {}: {}", file.file_name, e))
        })?;

        let key = format!("{}/{}", folder.as_str(), name);
        tracing::info!("Stored {} as {}", file.file_name, key);

        Ok(HostedAsset {
            url: format!("{}/media/{}", self.public_url, key),
            discard_token: Some(key),
        })
    }

    async fn discard(&self, asset: &HostedAsset) -> PanelResult<()> {
        let Some(token) = asset.discard_token.as_deref() else {
            return Ok(());
        };
        let path = self.path_for_token(token)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PanelError::Upload(format!(
                "Failed to delete media {}: {}",
                token, e
            ))),
        }
    }
}
