/// Cloudinary media host (unsigned upload preset)
use crate::{
    error::{PanelError, PanelResult},
    media::{HostedAsset, MediaFolder, MediaHost, UploadFile},
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

/// Uploads are allowed this long before the save is aborted
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Cloudinary backend
///
/// Authorization is the unsigned upload preset; no per-request credential is
/// sent. Delete tokens are requested on upload so a failed save can remove
/// what it already pushed.
#[derive(Clone)]
pub struct CloudinaryHost {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    upload_preset: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    delete_token: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl CloudinaryHost {
    pub fn new(api_base: &str, cloud_name: &str, upload_preset: &str) -> PanelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PanelError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/auto/upload", self.api_base, self.cloud_name)
    }

    fn delete_url(&self) -> String {
        format!("{}/v1_1/{}/delete_by_token", self.api_base, self.cloud_name)
    }

    /// Pull the host's own message out of a failed response
    fn error_message(status: reqwest::StatusCode, body: Option<UploadResponse>) -> String {
        body.and_then(|b| b.error)
            .map(|e| e.message)
            .unwrap_or_else(|| format!("unknown error (HTTP {})", status))
    }
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, file: &UploadFile, folder: MediaFolder) -> PanelResult<HostedAsset> {
        let part = Part::bytes(file.data.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type())
            .map_err(|e| PanelError::Upload(format!("Invalid content type: {}", e)))?;

        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", folder.as_str())
            .text("return_delete_token", "true");

        let res = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| PanelError::Upload(e.to_string()))?;

        let status = res.status();
        let body = res.json::<UploadResponse>().await.ok();

        if !status.is_success() {
            let message = Self::error_message(status, body);
            tracing::error!("Cloudinary rejected {}: {}", file.file_name, message);
            return Err(PanelError::Upload(message));
        }

        let body = body.ok_or_else(|| {
            PanelError::Upload("Media host returned an unreadable response".to_string())
        })?;
        let url = body
            .secure_url
            .ok_or_else(|| PanelError::Upload("Media host returned no URL".to_string()))?;

        tracing::info!("Uploaded {} to {}", file.file_name, folder.as_str());

        Ok(HostedAsset {
            url,
            discard_token: body.delete_token,
        })
    }

    async fn discard(&self, asset: &HostedAsset) -> PanelResult<()> {
        let Some(token) = asset.discard_token.as_deref() else {
            tracing::warn!("No delete token for {}, leaving it on the host", asset.url);
            return Ok(());
        };

        let res = self
            .client
            .post(self.delete_url())
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| PanelError::Upload(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.json::<UploadResponse>().await.ok();
            return Err(PanelError::Upload(Self::error_message(status, body)));
        }

        Ok(())
    }
}
