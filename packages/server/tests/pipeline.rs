//! End-to-end lifecycle of one image: generate variants, upload, reconcile,
//! repair. Runs against the filesystem store; no external services.

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use common::media::{
    SizeClass, SizePolicy, UploadOptions, Uploader, base_path, generate_variants, object_name,
    remove_variants,
};
use common::storage::filesystem::FsStore;
use common::storage::{BucketStore, WriteMode, list_all};
use server::maintenance::{reconcile, reprocess};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 40, 90]),
    ));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn fast_upload_options() -> UploadOptions {
    UploadOptions {
        put_timeout: Duration::from_secs(10),
        max_retries: 1,
        backoff_base_ms: 1,
        backoff_max_ms: 2,
    }
}

async fn temp_store() -> (Arc<FsStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::new(dir.path().join("produtos"), "http://localhost/storage")
        .await
        .unwrap();
    (Arc::new(store), dir)
}

#[tokio::test]
async fn upload_then_reconcile_then_delete() {
    let (store, _dir) = temp_store().await;
    let uploader = Uploader::new(store.clone() as Arc<dyn BucketStore>, fast_upload_options());

    // Ingest two images.
    let variants_a = generate_variants(png_bytes(1600, 900), SizePolicy::default(), SizeClass::ALL.to_vec())
        .await
        .unwrap();
    uploader
        .upload_variants("prod-a", &variants_a, WriteMode::Create)
        .await
        .unwrap();

    let variants_b = generate_variants(png_bytes(640, 640), SizePolicy::default(), SizeClass::ALL.to_vec())
        .await
        .unwrap();
    uploader
        .upload_variants("prod-b", &variants_b, WriteMode::Create)
        .await
        .unwrap();

    let all = list_all(store.as_ref(), "", 100).await.unwrap();
    assert_eq!(all.len(), 10);

    // Only prod-a is still referenced by the catalog.
    let referenced: HashSet<String> = [String::from("prod-a")].into();
    let manifest_dir = tempfile::tempdir().unwrap();
    let options = reconcile::ReconcileOptions {
        dry_run: false,
        batch_size: 3,
        batch_delay: Duration::from_millis(0),
        ..reconcile::ReconcileOptions::default()
    };

    let report = reconcile::run(store.as_ref(), &referenced, manifest_dir.path(), &options)
        .await
        .unwrap();

    assert_eq!(report.orphan_count, 5);
    assert_eq!(report.removed.len(), 5);
    assert!(report.failed.is_empty());
    assert!(report.bytes_freed > 0);

    let remaining = list_all(store.as_ref(), "", 100).await.unwrap();
    assert_eq!(remaining.len(), 5);
    assert!(remaining.iter().all(|obj| base_path(&obj.name) == "prod-a"));

    // Explicit per-image delete removes the survivor's whole set.
    let removed = remove_variants(store.as_ref(), "prod-a-medium.webp")
        .await
        .unwrap();
    assert_eq!(removed.len(), 5);
    assert!(list_all(store.as_ref(), "", 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn legacy_image_repair_round_trip() {
    let (store, _dir) = temp_store().await;

    // A legacy upload: original bytes under a .jpg name, no variants.
    store
        .put("old-product.jpg", &png_bytes(900, 600), "image/jpeg", WriteMode::Create)
        .await
        .unwrap();

    let options = reprocess::ReprocessOptions {
        apply: true,
        item_delay: Duration::from_millis(0),
        upload: fast_upload_options(),
        ..reprocess::ReprocessOptions::default()
    };
    let report = reprocess::run(
        store.clone() as Arc<dyn BucketStore>,
        vec!["old-product.jpg".into()],
        &options,
    )
    .await
    .unwrap();

    assert_eq!(report.processed, vec!["old-product".to_string()]);
    for class in SizeClass::ALL {
        assert!(
            store
                .exists(&object_name("old-product", class))
                .await
                .unwrap(),
            "{class} missing"
        );
    }

    // Second pass is a no-op.
    let report = reprocess::run(
        store.clone() as Arc<dyn BucketStore>,
        vec!["old-product.jpg".into()],
        &options,
    )
    .await
    .unwrap();
    assert!(report.processed.is_empty());
    assert_eq!(report.skipped, 1);
}
