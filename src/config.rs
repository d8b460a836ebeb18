/// Configuration management for the study panel
use crate::error::{PanelError, PanelResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main panel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub authentication: AuthConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    pub upload_limit: usize,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub backend: StoreBackend,
}

/// Which content store backs the panel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreBackend {
    Sqlite { database: PathBuf },
    Memory,
}

/// Media host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MediaConfig {
    Cloudinary {
        cloud_name: String,
        upload_preset: String,
        api_base: String,
    },
    Disk {
        location: PathBuf,
        public_url: String,
    },
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub admin_password: String,
    pub jwt_secret: String,
    pub admin_token_ttl_secs: i64,
    pub view_token_ttl_secs: i64,
}

/// Subscription retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub retry_max_attempts: Option<u32>,
}

impl SyncConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl PanelConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> PanelResult<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_vars<F>(var: F) -> PanelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = var("PANEL_HOSTNAME").unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = var("PANEL_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| PanelError::Validation("Invalid port number".to_string()))?;
        let version = env!("CARGO_PKG_VERSION").to_string();
        let upload_limit = var("PANEL_UPLOAD_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(20 * 1024 * 1024);

        let data_directory: PathBuf = var("PANEL_DATA_DIRECTORY")
            .unwrap_or_else(|| "./data".to_string())
            .into();

        let backend = match var("PANEL_STORE").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("sqlite") | None => StoreBackend::Sqlite {
                database: var("PANEL_DATABASE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| data_directory.join("panel.sqlite")),
            },
            Some(other) => {
                return Err(PanelError::Validation(format!(
                    "Unknown store backend: {}",
                    other
                )))
            }
        };

        let media = match (
            var("PANEL_CLOUDINARY_CLOUD_NAME"),
            var("PANEL_CLOUDINARY_UPLOAD_PRESET"),
        ) {
            (Some(cloud_name), Some(upload_preset)) => MediaConfig::Cloudinary {
                cloud_name,
                upload_preset,
                api_base: var("PANEL_CLOUDINARY_API_BASE")
                    .unwrap_or_else(|| "https://api.cloudinary.com".to_string()),
            },
            (Some(_), None) => {
                return Err(PanelError::Validation(
                    "Cloudinary upload preset required".to_string(),
                ))
            }
            _ => MediaConfig::Disk {
                location: var("PANEL_MEDIA_DIRECTORY")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| data_directory.join("media")),
                public_url: var("PANEL_PUBLIC_URL")
                    .unwrap_or_else(|| format!("http://{}:{}", hostname, port)),
            },
        };

        let admin_password = var("PANEL_ADMIN_PASSWORD")
            .ok_or_else(|| PanelError::Validation("Admin password required".to_string()))?;
        let jwt_secret = var("PANEL_JWT_SECRET")
            .ok_or_else(|| PanelError::Validation("JWT secret required".to_string()))?;
        let admin_token_ttl_secs = var("PANEL_ADMIN_TOKEN_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(12 * 60 * 60);
        let view_token_ttl_secs = var("PANEL_VIEW_TOKEN_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10 * 60);

        let retry_base_ms = var("PANEL_SYNC_RETRY_BASE_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        let retry_max_ms = var("PANEL_SYNC_RETRY_MAX_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);
        let retry_max_attempts = var("PANEL_SYNC_RETRY_MAX_ATTEMPTS").and_then(|v| v.parse().ok());

        let log_level = var("PANEL_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let config = PanelConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                backend,
            },
            media,
            authentication: AuthConfig {
                admin_password,
                jwt_secret,
                admin_token_ttl_secs,
                view_token_ttl_secs,
            },
            sync: SyncConfig {
                retry_base_ms,
                retry_max_ms,
                retry_max_attempts,
            },
            logging: LoggingConfig { level: log_level },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> PanelResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PanelError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.admin_password.is_empty() {
            return Err(PanelError::Validation(
                "Admin password cannot be empty".to_string(),
            ));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(PanelError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.admin_token_ttl_secs <= 0 || self.authentication.view_token_ttl_secs <= 0 {
            return Err(PanelError::Validation("Token lifetimes must be positive".to_string()));
        }

        if self.sync.retry_base_ms == 0 || self.sync.retry_max_ms < self.sync.retry_base_ms {
            return Err(PanelError::Validation(
                "Sync retry delays must satisfy 0 < base <= max".to_string(),
            ));
        }

        Ok(())
    }
}
