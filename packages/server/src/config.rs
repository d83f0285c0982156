use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use common::config::{StorageConfig, UploadConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Batch-job tuning shared by GC and reprocessing.
#[derive(Debug, Deserialize, Clone)]
pub struct MaintenanceConfig {
    /// Objects deleted per GC batch. Default: 50.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between GC batches, in milliseconds. Default: 500.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Pause between reprocessed images, in milliseconds. Default: 200.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Listing page size. Default: 1000.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Directory GC manifests are written to. Default: "./manifests".
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,
}

fn default_batch_size() -> usize {
    50
}
fn default_batch_delay_ms() -> u64 {
    500
}
fn default_item_delay_ms() -> u64 {
    200
}
fn default_page_size() -> usize {
    1000
}
fn default_manifest_dir() -> String {
    "./manifests".into()
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            item_delay_ms: default_item_delay_ms(),
            page_size: default_page_size(),
            manifest_dir: default_manifest_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., VITRINE__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("VITRINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
