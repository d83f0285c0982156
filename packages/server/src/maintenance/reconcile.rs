//! Orphan reconciliation: diff the blob store against the catalog and delete
//! what nothing references.
//!
//! Both stores are snapshotted before anything is mutated, and a write-ahead
//! manifest of every candidate deletion is persisted before the first delete
//! call. Dry-run is the default; mutation requires explicit opt-in.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use common::PipelineError;
use common::media::base_path;
use common::storage::{BucketStore, StorageError, StoredObject, list_all};

#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    /// Report only; no deletion. The default entry point.
    pub dry_run: bool,
    /// Objects per deletion batch.
    pub batch_size: usize,
    /// Pause between batches, to stay under store rate limits.
    pub batch_delay: Duration,
    /// Listing page size.
    pub page_size: usize,
    /// Cap on orphans processed this run.
    pub limit: Option<usize>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            batch_size: 50,
            batch_delay: Duration::from_millis(500),
            page_size: 1000,
            limit: None,
        }
    }
}

/// Outcome of one reconciliation run.
#[derive(Clone, Debug, Serialize)]
pub struct ReconcileReport {
    pub total_storage: usize,
    pub total_referenced: usize,
    pub orphan_count: usize,
    /// Object names deleted this run (empty on dry-run).
    pub removed: Vec<String>,
    /// Object names that could not be deleted.
    pub failed: Vec<String>,
    pub bytes_freed: u64,
    pub dry_run: bool,
    /// Where the write-ahead manifest was persisted.
    pub manifest_path: Option<PathBuf>,
}

#[derive(Serialize)]
struct Manifest<'a> {
    started_at: chrono::DateTime<chrono::Utc>,
    dry_run: bool,
    candidates: &'a [StoredObjectEntry],
}

#[derive(Serialize)]
struct StoredObjectEntry {
    name: String,
    size: u64,
}

/// Objects whose base path has no catalog reference.
pub fn orphan_candidates(
    objects: &[StoredObject],
    referenced: &HashSet<String>,
) -> Vec<StoredObject> {
    objects
        .iter()
        .filter(|obj| !referenced.contains(&base_path(&obj.name)))
        .cloned()
        .collect()
}

/// Run one GC pass over a pre-built reference set.
///
/// The caller supplies `referenced` (see `reference_index::build`) so the
/// catalog snapshot is taken before, not during, deletion.
pub async fn run(
    store: &dyn BucketStore,
    referenced: &HashSet<String>,
    manifest_dir: &Path,
    options: &ReconcileOptions,
) -> Result<ReconcileReport, PipelineError> {
    let objects = list_all(store, "", options.page_size).await?;
    let mut orphans = orphan_candidates(&objects, referenced);
    orphans.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(limit) = options.limit
        && orphans.len() > limit
    {
        warn!(
            total = orphans.len(),
            limit, "orphan candidates truncated by limit"
        );
        orphans.truncate(limit);
    }

    info!(
        storage = objects.len(),
        referenced = referenced.len(),
        orphans = orphans.len(),
        dry_run = options.dry_run,
        "reconciliation snapshot complete"
    );

    let manifest_path = write_manifest(manifest_dir, &orphans, options.dry_run).await?;

    let mut report = ReconcileReport {
        total_storage: objects.len(),
        total_referenced: referenced.len(),
        orphan_count: orphans.len(),
        removed: Vec::new(),
        failed: Vec::new(),
        bytes_freed: 0,
        dry_run: options.dry_run,
        manifest_path: Some(manifest_path),
    };

    if options.dry_run {
        return Ok(report);
    }

    let mut first_batch = true;
    for batch in orphans.chunks(options.batch_size.max(1)) {
        if !first_batch {
            tokio::time::sleep(options.batch_delay).await;
        }
        first_batch = false;

        delete_batch(store, batch, &mut report).await;
    }

    info!(
        removed = report.removed.len(),
        failed = report.failed.len(),
        bytes_freed = report.bytes_freed,
        "reconciliation finished"
    );

    Ok(report)
}

/// Delete one batch, falling back to per-object deletes when the batch
/// mechanism fails so one bad object cannot block its siblings.
async fn delete_batch(store: &dyn BucketStore, batch: &[StoredObject], report: &mut ReconcileReport) {
    let names: Vec<String> = batch.iter().map(|obj| obj.name.clone()).collect();

    match store.delete_many(&names).await {
        Ok(removed) => {
            for obj in batch {
                if removed.contains(&obj.name) {
                    report.bytes_freed += obj.size;
                    report.removed.push(obj.name.clone());
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "batch delete failed, falling back to per-object");
            for obj in batch {
                match store.delete(&obj.name).await {
                    Ok(true) => {
                        report.bytes_freed += obj.size;
                        report.removed.push(obj.name.clone());
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(object = %obj.name, error = %err, "orphan delete failed");
                        report.failed.push(obj.name.clone());
                    }
                }
            }
        }
    }
}

/// Persist the write-ahead manifest. Runs before any deletion; a terminated
/// run can always be audited against it.
async fn write_manifest(
    dir: &Path,
    candidates: &[StoredObject],
    dry_run: bool,
) -> Result<PathBuf, PipelineError> {
    let entries: Vec<StoredObjectEntry> = candidates
        .iter()
        .map(|obj| StoredObjectEntry {
            name: obj.name.clone(),
            size: obj.size,
        })
        .collect();

    let manifest = Manifest {
        started_at: chrono::Utc::now(),
        dry_run,
        candidates: &entries,
    };

    let body = serde_json::to_vec_pretty(&manifest).map_err(|e| {
        PipelineError::Storage(StorageError::Backend(format!(
            "manifest serialization failed: {e}"
        )))
    })?;

    fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::Storage(e.into()))?;
    let path = dir.join(format!(
        "gc-{}.json",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f")
    ));
    fs::write(&path, body)
        .await
        .map_err(|e| PipelineError::Storage(e.into()))?;

    info!(path = %path.display(), candidates = entries.len(), "wrote deletion manifest");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::memory::MemoryStore;

    fn refs(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn orphan_set_is_exact_difference() {
        let objects = vec![
            StoredObject {
                name: "a-thumb.webp".into(),
                size: 1,
            },
            StoredObject {
                name: "a-large.webp".into(),
                size: 2,
            },
            StoredObject {
                name: "b-original.webp".into(),
                size: 3,
            },
            StoredObject {
                name: "c-small.webp".into(),
                size: 4,
            },
        ];

        let orphans = orphan_candidates(&objects, &refs(&["a", "b"]));
        let names: Vec<&str> = orphans.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["c-small.webp"]);
    }

    #[tokio::test]
    async fn dry_run_deletes_nothing_but_writes_manifest() {
        let store = MemoryStore::new();
        store.insert("a-thumb.webp", b"x");
        store.insert("c-small.webp", b"orphan");
        let dir = tempfile::tempdir().unwrap();

        let report = run(
            &store,
            &refs(&["a"]),
            dir.path(),
            &ReconcileOptions::default(),
        )
        .await
        .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.orphan_count, 1);
        assert!(report.removed.is_empty());
        assert!(store.contains("c-small.webp"));

        let manifest_path = report.manifest_path.unwrap();
        let manifest = std::fs::read_to_string(manifest_path).unwrap();
        assert!(manifest.contains("c-small.webp"));
        assert!(!manifest.contains("a-thumb.webp"));
    }

    #[tokio::test]
    async fn live_run_removes_only_orphans() {
        let store = MemoryStore::new();
        store.insert("a-thumb.webp", b"x");
        store.insert("a-original.webp", b"xx");
        store.insert("c-small.webp", b"orphan");
        store.insert("c-original.webp", b"orphan2");
        let dir = tempfile::tempdir().unwrap();

        let options = ReconcileOptions {
            dry_run: false,
            batch_delay: Duration::from_millis(0),
            ..ReconcileOptions::default()
        };
        let report = run(&store, &refs(&["a"]), dir.path(), &options)
            .await
            .unwrap();

        assert_eq!(report.total_storage, 4);
        assert_eq!(report.orphan_count, 2);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.bytes_freed, 13);
        assert!(report.failed.is_empty());
        assert!(store.contains("a-thumb.webp"));
        assert!(store.contains("a-original.webp"));
        assert!(!store.contains("c-small.webp"));
        assert!(!store.contains("c-original.webp"));
    }

    #[tokio::test]
    async fn batch_failure_falls_back_to_per_object() {
        let store = MemoryStore::new();
        store.insert("x-thumb.webp", b"1");
        store.insert("y-thumb.webp", b"2");
        store.insert("z-thumb.webp", b"3");
        store.fail_delete_many();
        store.fail_deletes("y-thumb.webp");
        let dir = tempfile::tempdir().unwrap();

        let options = ReconcileOptions {
            dry_run: false,
            batch_delay: Duration::from_millis(0),
            ..ReconcileOptions::default()
        };
        let report = run(&store, &refs(&[]), dir.path(), &options).await.unwrap();

        // The bad object is recorded; its batch siblings still went away.
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.failed, vec!["y-thumb.webp".to_string()]);
        assert!(store.contains("y-thumb.webp"));
        assert!(!store.contains("x-thumb.webp"));
    }

    #[tokio::test]
    async fn limit_caps_processed_orphans() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert(&format!("orphan-{i}-thumb.webp"), b"x");
        }
        let dir = tempfile::tempdir().unwrap();

        let options = ReconcileOptions {
            dry_run: false,
            batch_delay: Duration::from_millis(0),
            limit: Some(2),
            ..ReconcileOptions::default()
        };
        let report = run(&store, &refs(&[]), dir.path(), &options).await.unwrap();

        assert_eq!(report.orphan_count, 2);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(store.names().len(), 3);
    }
}
