use std::path::PathBuf;

use serde::Deserialize;

/// Which object-store backend to run against.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Filesystem,
}

/// Object-store settings shared by the server and the maintenance CLI.
#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    /// Backend selector. Default: filesystem (development).
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Bucket / logical namespace name. Default: "produtos".
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// S3 region. Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3 endpoint (e.g. a Supabase or MinIO URL).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Optional folder segment prefixed to every object name.
    #[serde(default)]
    pub folder: Option<String>,
    /// Base URL the stored objects are publicly served from.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Root directory for the filesystem backend. Default: "./storage".
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Upload payload cap in bytes. Default: 25 MB.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Filesystem
}
fn default_bucket() -> String {
    "produtos".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_public_base_url() -> String {
    "http://localhost:3000/storage".into()
}
fn default_root() -> PathBuf {
    PathBuf::from("./storage")
}
fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            folder: None,
            public_base_url: default_public_base_url(),
            root: default_root(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Fan-out behavior for one image's variant puts.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct UploadConfig {
    /// Deadline for a single variant put. Default: 30s.
    #[serde(default = "default_put_timeout_secs")]
    pub put_timeout_secs: u64,
    /// Retry budget for variants that failed their first put. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Base backoff between retries, in milliseconds. Default: 500.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Backoff ceiling in milliseconds. Default: 8000.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_put_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u8 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    8000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            put_timeout_secs: default_put_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}
