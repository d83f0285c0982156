use std::sync::Arc;

use anyhow::Context;
use sea_orm::DatabaseConnection;

use common::config::{StorageBackend, StorageConfig};
use common::storage::{BucketStore, filesystem::FsStore, s3::S3Store};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn BucketStore>,
    pub config: Arc<AppConfig>,
}

/// Construct the configured object-store backend.
pub async fn build_store(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn BucketStore>> {
    let store: Arc<dyn BucketStore> = match cfg.backend {
        StorageBackend::S3 => {
            Arc::new(S3Store::from_config(cfg).context("failed to initialize S3 store")?)
        }
        StorageBackend::Filesystem => Arc::new(
            FsStore::from_config(cfg)
                .await
                .context("failed to initialize filesystem store")?,
        ),
    };
    Ok(store)
}
