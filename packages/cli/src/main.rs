use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use common::media::UploadOptions;
use server::config::AppConfig;
use server::database::init_db;
use server::maintenance::{reconcile, reference_index, reprocess};
use server::state::build_store;

#[derive(Parser)]
#[command(name = "vitrine", version, about = "Vitrine media maintenance jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the blob store against the catalog and collect orphans.
    ///
    /// Dry-run by default: reports and writes the deletion manifest without
    /// touching storage. Pass --delete to actually remove orphans.
    Gc {
        /// Actually delete orphans instead of only reporting them.
        #[arg(long)]
        delete: bool,
        /// Cap the number of orphans processed this run.
        #[arg(long)]
        limit: Option<usize>,
        /// Override the configured manifest directory.
        #[arg(long)]
        manifest_dir: Option<PathBuf>,
    },
    /// Re-run the variant pipeline over catalog rows that never went
    /// through it.
    ///
    /// Dry-run by default: reports which images would be repaired. Pass
    /// --apply to regenerate and overwrite.
    Reprocess {
        /// Actually regenerate and upload variants.
        #[arg(long)]
        apply: bool,
        /// Cap the number of images processed this run.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    let store = build_store(&config.storage).await?;

    let hard_failures = match cli.command {
        Command::Gc {
            delete,
            limit,
            manifest_dir,
        } => {
            let referenced = reference_index::build(&db, &config.storage)
                .await
                .context("Failed to scan catalog references")?;

            let options = reconcile::ReconcileOptions {
                dry_run: !delete,
                batch_size: config.maintenance.batch_size,
                batch_delay: Duration::from_millis(config.maintenance.batch_delay_ms),
                page_size: config.maintenance.page_size,
                limit,
            };
            let manifest_dir =
                manifest_dir.unwrap_or_else(|| PathBuf::from(&config.maintenance.manifest_dir));

            let report = reconcile::run(store.as_ref(), &referenced, &manifest_dir, &options)
                .await
                .context("Reconciliation failed")?;

            println!(
                "gc: {} objects in storage, {} referenced, {} orphan(s)",
                report.total_storage, report.total_referenced, report.orphan_count
            );
            if let Some(path) = &report.manifest_path {
                println!("gc: manifest written to {}", path.display());
            }
            if report.dry_run {
                println!("gc: dry-run, nothing deleted (pass --delete to remove orphans)");
            } else {
                println!(
                    "gc: removed {} object(s), freed {} bytes, {} failed",
                    report.removed.len(),
                    report.bytes_freed,
                    report.failed.len()
                );
            }
            report.failed.len()
        }
        Command::Reprocess { apply, limit } => {
            let references = reference_index::scan_values(&db, &config.storage)
                .await
                .context("Failed to scan catalog references")?;

            let options = reprocess::ReprocessOptions {
                apply,
                limit,
                item_delay: Duration::from_millis(config.maintenance.item_delay_ms),
                upload: UploadOptions::from(&config.upload),
                ..reprocess::ReprocessOptions::default()
            };

            let report = reprocess::run(store, references, &options)
                .await
                .context("Reprocessing failed")?;

            println!(
                "reprocess: {} processed, {} skipped, {} failed{}",
                report.processed.len(),
                report.skipped,
                report.failed.len(),
                if report.dry_run {
                    " (dry-run, pass --apply to repair)"
                } else {
                    ""
                }
            );
            for (base, reason) in &report.failed {
                println!("reprocess: failed {base}: {reason}");
            }
            report.failed.len()
        }
    };

    if hard_failures > 0 {
        info!(failures = hard_failures, "finished with failures");
        std::process::exit(1);
    }

    Ok(())
}
