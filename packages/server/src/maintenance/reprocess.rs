//! Reprocessing driver: re-runs the variant pipeline over catalog rows whose
//! images never went through it (legacy uploads, bad orientation).
//!
//! Idempotent by construction: a base whose `original` variant already
//! exists is skipped, so a second pass over an unmodified catalog performs
//! zero uploads. This is the only place overwrite puts are permitted.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use common::PipelineError;
use common::media::{
    SizeClass, SizePolicy, UploadOptions, Uploader, base_path, generate_variants_sync,
    has_size_suffix, object_name,
};
use common::storage::{BucketStore, StorageError, WriteMode};

#[derive(Clone, Debug)]
pub struct ReprocessOptions {
    /// When false (the default), only report what would be done.
    pub apply: bool,
    /// Cap on images processed this run.
    pub limit: Option<usize>,
    /// Pause between images, to stay under store rate limits.
    pub item_delay: Duration,
    pub upload: UploadOptions,
    pub policy: SizePolicy,
}

impl Default for ReprocessOptions {
    fn default() -> Self {
        Self {
            apply: false,
            limit: None,
            item_delay: Duration::from_millis(200),
            upload: UploadOptions::default(),
            policy: SizePolicy::default(),
        }
    }
}

/// Outcome of one reprocessing run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ReprocessReport {
    /// Bases whose variant set was (re)generated.
    pub processed: Vec<String>,
    /// Bases already carrying a complete variant set.
    pub skipped: usize,
    /// Bases that failed, with the reason.
    pub failed: Vec<(String, String)>,
    pub dry_run: bool,
}

/// Extensions originals were historically uploaded under, tried in order.
const LEGACY_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Run the driver over catalog references (bare names, already stripped of
/// URL prefixes; see `utils::url::strip_public_prefix`).
pub async fn run(
    store: Arc<dyn BucketStore>,
    references: Vec<String>,
    options: &ReprocessOptions,
) -> Result<ReprocessReport, PipelineError> {
    let mut report = ReprocessReport {
        dry_run: !options.apply,
        ..ReprocessReport::default()
    };

    let uploader = Uploader::new(Arc::clone(&store), options.upload);
    let mut seen = std::collections::HashSet::new();
    let mut processed = 0usize;

    for reference in references {
        if let Some(limit) = options.limit
            && processed >= limit
        {
            break;
        }

        let base = base_path(&reference);
        if base.is_empty() || !seen.insert(base.clone()) {
            continue;
        }

        // A reference that already carries a size suffix was written by the
        // pipeline; nothing to repair.
        if has_size_suffix(&reference) {
            report.skipped += 1;
            continue;
        }

        // Otherwise the original variant is the success marker.
        let marker = object_name(&base, SizeClass::Original);
        match store.exists(&marker).await {
            Ok(true) => {
                report.skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                report.failed.push((base, err.to_string()));
                continue;
            }
        }

        if processed > 0 {
            tokio::time::sleep(options.item_delay).await;
        }
        processed += 1;

        if !options.apply {
            report.processed.push(base);
            continue;
        }

        match repair_one(&store, &uploader, &base, &reference, options).await {
            Ok(()) => report.processed.push(base),
            Err(err) => {
                warn!(base = %base, error = %err, "reprocess failed");
                report.failed.push((base, err.to_string()));
            }
        }
    }

    info!(
        processed = report.processed.len(),
        skipped = report.skipped,
        failed = report.failed.len(),
        dry_run = report.dry_run,
        "reprocessing finished"
    );

    Ok(report)
}

/// Locate original bytes and regenerate the full variant set for one base.
async fn repair_one(
    store: &Arc<dyn BucketStore>,
    uploader: &Uploader,
    base: &str,
    reference: &str,
    options: &ReprocessOptions,
) -> Result<(), PipelineError> {
    let bytes = fetch_original(store.as_ref(), base, reference).await?;

    let policy = options.policy;
    let variants = tokio::task::spawn_blocking(move || {
        generate_variants_sync(&bytes, &policy, &SizeClass::ALL)
    })
    .await
    .map_err(|e| PipelineError::Generation(format!("generation task panicked: {e}")))??;

    // Repair is the one operation allowed to overwrite.
    uploader
        .upload_variants(base, &variants, WriteMode::Overwrite)
        .await?;
    Ok(())
}

/// Try the candidate legacy names for a base, in order, then the literal
/// reference as supplied.
async fn fetch_original(
    store: &dyn BucketStore,
    base: &str,
    reference: &str,
) -> Result<Vec<u8>, PipelineError> {
    let mut candidates: Vec<String> = LEGACY_EXTENSIONS
        .iter()
        .map(|ext| format!("{base}.{ext}"))
        .collect();
    candidates.push(base.to_string());
    if reference != base && !candidates.iter().any(|c| c == reference) {
        candidates.push(reference.to_string());
    }

    for candidate in &candidates {
        match store.get(candidate).await {
            Ok(bytes) => return Ok(bytes),
            Err(StorageError::NotFound(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(PipelineError::ReferenceNotFound(base.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::memory::MemoryStore;
    use image::DynamicImage;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([10, 20, 30]),
        ));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn fast_options(apply: bool) -> ReprocessOptions {
        ReprocessOptions {
            apply,
            item_delay: Duration::from_millis(0),
            upload: common::media::UploadOptions {
                put_timeout: Duration::from_secs(5),
                max_retries: 1,
                backoff_base_ms: 1,
                backoff_max_ms: 2,
            },
            ..ReprocessOptions::default()
        }
    }

    #[tokio::test]
    async fn repairs_legacy_images_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.insert("legacy-1.jpg", &png_bytes(640, 480));

        let report = run(
            Arc::clone(&store) as Arc<dyn BucketStore>,
            vec!["legacy-1.jpg".into()],
            &fast_options(true),
        )
        .await
        .unwrap();

        assert_eq!(report.processed, vec!["legacy-1".to_string()]);
        for class in SizeClass::ALL {
            assert!(store.contains(&format!("legacy-1-{}.webp", class.suffix())));
        }

        // Second pass over the unmodified catalog: zero uploads.
        let puts_after_first = store.put_calls();
        let report = run(
            Arc::clone(&store) as Arc<dyn BucketStore>,
            vec!["legacy-1.jpg".into()],
            &fast_options(true),
        )
        .await
        .unwrap();

        assert!(report.processed.is_empty());
        assert_eq!(report.skipped, 1);
        assert_eq!(store.put_calls(), puts_after_first);
    }

    #[tokio::test]
    async fn suffixed_references_are_skipped() {
        let store = Arc::new(MemoryStore::new());

        let report = run(
            Arc::clone(&store) as Arc<dyn BucketStore>,
            vec!["shoe-42-thumb.webp".into(), "shoe-43-original.webp".into()],
            &fast_options(true),
        )
        .await
        .unwrap();

        assert_eq!(report.skipped, 2);
        assert!(report.processed.is_empty());
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn missing_original_is_recorded_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.insert("ok-1.png", &png_bytes(64, 64));

        let report = run(
            Arc::clone(&store) as Arc<dyn BucketStore>,
            vec!["gone-1".into(), "ok-1".into()],
            &fast_options(true),
        )
        .await
        .unwrap();

        assert_eq!(report.processed, vec!["ok-1".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "gone-1");
    }

    #[tokio::test]
    async fn dry_run_reports_without_uploading() {
        let store = Arc::new(MemoryStore::new());
        store.insert("legacy-9.jpg", &png_bytes(64, 64));

        let report = run(
            Arc::clone(&store) as Arc<dyn BucketStore>,
            vec!["legacy-9.jpg".into()],
            &fast_options(false),
        )
        .await
        .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.processed, vec!["legacy-9".to_string()]);
        assert_eq!(store.put_calls(), 0);
    }

    #[tokio::test]
    async fn limit_caps_run_size() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..4 {
            store.insert(&format!("legacy-{i}.jpg"), &png_bytes(32, 32));
        }

        let mut options = fast_options(true);
        options.limit = Some(2);
        let report = run(
            Arc::clone(&store) as Arc<dyn BucketStore>,
            (0..4).map(|i| format!("legacy-{i}.jpg")).collect(),
            &options,
        )
        .await
        .unwrap();

        assert_eq!(report.processed.len(), 2);
    }
}
