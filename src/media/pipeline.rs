/// Sequential upload pipeline with rollback
use crate::{
    error::{PanelError, PanelResult},
    media::{HostedAsset, MediaFolder, MediaHost, UploadFile},
};
use std::sync::Arc;

/// Assets uploaded for a single save, in upload order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub assets: Vec<HostedAsset>,
}

impl UploadBatch {
    pub fn urls(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.url.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Drives a [`MediaHost`] for saves that carry files.
///
/// Files go up one at a time, each awaited before the next. If one fails, the
/// already-uploaded prefix is discarded before the error is returned, so a
/// failed save leaves nothing behind on the host.
#[derive(Clone)]
pub struct UploadPipeline {
    host: Arc<dyn MediaHost>,
    max_file_size: usize,
}

impl UploadPipeline {
    pub fn new(host: Arc<dyn MediaHost>, max_file_size: usize) -> Self {
        Self {
            host,
            max_file_size,
        }
    }

    /// Upload a single file
    pub async fn upload_one(&self, file: &UploadFile, folder: MediaFolder) -> PanelResult<HostedAsset> {
        if file.data.len() > self.max_file_size {
            return Err(PanelError::Validation(format!(
                "{} exceeds the {} byte upload limit",
                file.file_name, self.max_file_size
            )));
        }

        self.host.upload(file, folder).await
    }

    /// Upload files in order; on failure discard what was uploaded and return the error
    pub async fn upload_all(&self, files: &[&UploadFile], folder: MediaFolder) -> PanelResult<UploadBatch> {
        let mut batch = UploadBatch::default();

        for file in files {
            match self.upload_one(file, folder).await {
                Ok(asset) => batch.assets.push(asset),
                Err(e) => {
                    tracing::warn!(
                        "Upload of {} failed after {} of {} files: {}",
                        file.file_name,
                        batch.assets.len(),
                        files.len(),
                        e
                    );
                    self.rollback(batch).await;
                    return Err(e);
                }
            }
        }

        Ok(batch)
    }

    /// Best-effort removal of a batch whose save did not complete
    pub async fn rollback(&self, batch: UploadBatch) {
        if batch.is_empty() {
            return;
        }

        tracing::info!("Rolling back {} uploaded assets", batch.assets.len());

        for asset in &batch.assets {
            if let Err(e) = self.host.discard(asset).await {
                tracing::error!("Failed to discard orphaned asset {}: {}", asset.url, e);
            }
        }
    }
}
