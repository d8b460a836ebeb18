/// Application context and dependency injection
use crate::{
    auth::AdminGate,
    config::{MediaConfig, PanelConfig, StoreBackend},
    db,
    error::{PanelError, PanelResult},
    media::{CloudinaryHost, DiskMediaHost, MediaHost, UploadPipeline},
    rate_limit::{AttemptLimiter, RateLimitConfig},
    service::PanelService,
    store::{ContentStore, MemoryContentStore, SqliteContentStore},
    sync::{ContentSync, RetryPolicy},
};
use std::path::PathBuf;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<PanelConfig>,
    pub store: Arc<dyn ContentStore>,
    pub sync: Arc<ContentSync>,
    pub service: PanelService,
    pub gate: Arc<AdminGate>,
    pub limiter: AttemptLimiter,
    /// Directory served at `/media` when media is kept on disk
    pub media_root: Option<PathBuf>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: PanelConfig) -> PanelResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let store: Arc<dyn ContentStore> = match &config.storage.backend {
            StoreBackend::Sqlite { database } => {
                let pool = db::create_pool(database, db::DatabaseOptions::default()).await?;
                db::run_migrations(&pool).await?;
                db::test_connection(&pool).await?;
                tracing::info!("Using SQLite content store at {}", database.display());
                Arc::new(SqliteContentStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory content store; content is lost on restart");
                Arc::new(MemoryContentStore::new())
            }
        };

        let (host, media_root): (Arc<dyn MediaHost>, Option<PathBuf>) = match &config.media {
            MediaConfig::Cloudinary {
                cloud_name,
                upload_preset,
                api_base,
            } => {
                tracing::info!("Uploading media to Cloudinary cloud {}", cloud_name);
                (
                    Arc::new(CloudinaryHost::new(api_base, cloud_name, upload_preset)?),
                    None,
                )
            }
            MediaConfig::Disk {
                location,
                public_url,
            } => {
                tracing::info!("Storing media under {}", location.display());
                (
                    Arc::new(DiskMediaHost::new(location.clone(), public_url)),
                    Some(location.clone()),
                )
            }
        };

        Ok(Self::from_parts(config, store, host, media_root))
    }

    /// Assemble a context around existing backends. Must be called inside a Tokio runtime.
    pub fn from_parts(
        config: PanelConfig,
        store: Arc<dyn ContentStore>,
        host: Arc<dyn MediaHost>,
        media_root: Option<PathBuf>,
    ) -> Self {
        let pipeline = UploadPipeline::new(host, config.service.upload_limit);
        let service = PanelService::new(store.clone(), pipeline);
        let sync = Arc::new(ContentSync::mount(
            store.clone(),
            RetryPolicy::from(&config.sync),
        ));
        let gate = Arc::new(AdminGate::new(
            &config.authentication.admin_password,
            &config.authentication.jwt_secret,
            config.authentication.admin_token_ttl_secs,
            config.authentication.view_token_ttl_secs,
        ));

        Self {
            config: Arc::new(config),
            store,
            sync,
            service,
            gate,
            limiter: AttemptLimiter::new(RateLimitConfig::default()),
            media_root,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &PanelConfig) -> PanelResult<()> {
        let data_dir = &config.storage.data_directory;
        if !data_dir.exists() {
            tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
                PanelError::Internal(format!("Failed to create directory {:?}: {}", data_dir, e))
            })?;
        }

        if let MediaConfig::Disk { location, .. } = &config.media {
            tokio::fs::create_dir_all(location).await?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
