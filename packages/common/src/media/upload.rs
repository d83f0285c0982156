use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::UploadConfig;
use crate::retry::calculate_backoff;
use crate::storage::{BucketStore, StorageError, WriteMode, list_all};

use super::codec::{base_path, object_name};
use super::error::PipelineError;
use super::generator::Variant;

const VARIANT_CONTENT_TYPE: &str = "image/webp";

/// Result of storing one image's full variant set.
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    /// The canonical path the catalog should reference.
    pub canonical: String,
    /// Object names actually stored.
    pub stored: Vec<String>,
}

/// Tuning for the per-variant puts.
#[derive(Clone, Copy, Debug)]
pub struct UploadOptions {
    pub put_timeout: Duration,
    pub max_retries: u8,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl From<&UploadConfig> for UploadOptions {
    fn from(cfg: &UploadConfig) -> Self {
        Self {
            put_timeout: Duration::from_secs(cfg.put_timeout_secs),
            max_retries: cfg.max_retries,
            backoff_base_ms: cfg.backoff_base_ms,
            backoff_max_ms: cfg.backoff_max_ms,
        }
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Stores every variant of one image, in parallel, and only reports success
/// when all of them landed.
///
/// A canonical path with a missing size class is worse than no upload at
/// all, so any variant that cannot be stored after the retry budget causes
/// the already-stored siblings to be deleted and the whole call to fail.
pub struct Uploader {
    store: Arc<dyn BucketStore>,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(store: Arc<dyn BucketStore>, options: UploadOptions) -> Self {
        Self { store, options }
    }

    /// Upload all `variants` under `canonical`, waiting for every outcome
    /// rather than failing fast on the first rejection.
    pub async fn upload_variants(
        &self,
        canonical: &str,
        variants: &[Variant],
        mode: WriteMode,
    ) -> Result<UploadOutcome, PipelineError> {
        let named: Vec<(String, &Variant)> = variants
            .iter()
            .map(|variant| (object_name(canonical, variant.class), variant))
            .collect();

        let puts = named.iter().map(|(name, variant)| {
            let store = Arc::clone(&self.store);
            let timeout = self.options.put_timeout;
            async move {
                let result = tokio::time::timeout(
                    timeout,
                    store.put(name, &variant.bytes, VARIANT_CONTENT_TYPE, mode),
                )
                .await;
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(StorageError::Backend(format!("put timed out: {name}"))),
                }
            }
        });

        let first_pass = join_all(puts).await;

        let mut stored: Vec<String> = Vec::with_capacity(named.len());
        let mut pending: Vec<(String, &Variant)> = Vec::new();
        let mut fatal: Option<StorageError> = None;

        for ((name, variant), outcome) in named.iter().zip(first_pass) {
            match outcome {
                Ok(()) => stored.push(name.clone()),
                // A fresh-path collision means someone else owns this name.
                // Retrying cannot help and overwriting would corrupt theirs.
                Err(StorageError::AlreadyExists(_)) if mode == WriteMode::Create => {
                    fatal = Some(StorageError::AlreadyExists(name.clone()));
                }
                Err(err) => {
                    warn!(object = %name, error = %err, "variant put failed, will retry");
                    pending.push((name.clone(), *variant));
                    if fatal.is_none() && !err.is_transient() {
                        fatal = Some(err);
                    }
                }
            }
        }

        if fatal.is_none() && !pending.is_empty() {
            pending = self.retry_pending(pending, mode, &mut stored).await;
        }

        if pending.is_empty() && fatal.is_none() {
            info!(canonical, variants = stored.len(), "variant set stored");
            return Ok(UploadOutcome {
                canonical: canonical.to_string(),
                stored,
            });
        }

        let first_error = fatal
            .map(|e| e.to_string())
            .or_else(|| pending.first().map(|(name, _)| format!("put failed: {name}")))
            .unwrap_or_else(|| "unknown".into());

        self.roll_back(&stored).await;
        Err(PipelineError::PartialFailure {
            stored: stored.len(),
            total: variants.len(),
            first_error,
        })
    }

    /// Retry failed puts with bounded backoff. Returns whatever is still
    /// missing after the budget is spent.
    async fn retry_pending<'a>(
        &self,
        mut pending: Vec<(String, &'a Variant)>,
        mode: WriteMode,
        stored: &mut Vec<String>,
    ) -> Vec<(String, &'a Variant)> {
        for attempt in 1..=self.options.max_retries {
            if pending.is_empty() {
                break;
            }
            tokio::time::sleep(calculate_backoff(
                attempt,
                self.options.backoff_base_ms,
                self.options.backoff_max_ms,
            ))
            .await;

            let mut still_pending = Vec::new();
            for (name, variant) in pending {
                let result = tokio::time::timeout(
                    self.options.put_timeout,
                    self.store
                        .put(&name, &variant.bytes, VARIANT_CONTENT_TYPE, mode),
                )
                .await;
                match result {
                    Ok(Ok(())) => stored.push(name),
                    // A timed-out first attempt may still have landed; the
                    // object under this name is ours.
                    Ok(Err(StorageError::AlreadyExists(_))) => stored.push(name),
                    Ok(Err(err)) => {
                        warn!(object = %name, attempt, error = %err, "variant retry failed");
                        still_pending.push((name, variant));
                    }
                    Err(_) => {
                        warn!(object = %name, attempt, "variant retry timed out");
                        still_pending.push((name, variant));
                    }
                }
            }
            pending = still_pending;
        }
        pending
    }

    /// Best-effort removal of the variants that did land. Anything that
    /// survives a failed rollback is picked up by the next GC pass.
    async fn roll_back(&self, stored: &[String]) {
        for name in stored {
            match self.store.delete(name).await {
                Ok(_) => {}
                Err(err) => warn!(object = %name, error = %err, "rollback delete failed"),
            }
        }
        if !stored.is_empty() {
            info!(count = stored.len(), "rolled back partially stored variants");
        }
    }
}

/// Remove every variant sharing a base name.
///
/// Matching is on the exact base followed by `-`, never a bare prefix, so
/// deleting `shoe-42` can never touch `shoe-420-*`. If listing fails, falls
/// back to deleting the single literal name supplied.
pub async fn remove_variants(
    store: &dyn BucketStore,
    name_or_url: &str,
) -> Result<Vec<String>, StorageError> {
    let base = base_path(name_or_url);
    let prefix = format!("{base}-");

    let listed = match list_all(store, &prefix, 100).await {
        Ok(objects) => objects,
        Err(err) => {
            warn!(base = %base, error = %err, "listing failed, deleting literal path only");
            return match store.delete(name_or_url).await? {
                true => Ok(vec![name_or_url.to_string()]),
                false => Ok(Vec::new()),
            };
        }
    };

    let mut removed = Vec::new();
    for object in listed {
        if base_path(&object.name) != base {
            continue;
        }
        if store.delete(&object.name).await? {
            removed.push(object.name);
        }
    }

    info!(base = %base, count = removed.len(), "variant set removed");
    Ok(removed)
}
