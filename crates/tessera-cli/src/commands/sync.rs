//! Sync command - Run one sync pass
//!
//! Provides the `tessera sync` CLI command which:
//! 1. Applies flag overrides to the loaded configuration
//! 2. Asks the metadata store for the block store address
//! 3. Opens the local index inside the base directory
//! 4. Runs the SyncEngine once and displays the report

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tessera_cache::{DatabasePool, SqliteLocalIndex};
use tessera_core::config::{Config, ConfigBuilder};
use tessera_core::domain::BlockSize;
use tessera_core::ports::IMetaStore;
use tessera_rpc::BlockStoreClient;
use tessera_sync::{LocalFileSystemAdapter, SyncEngine, SyncReport};
use tracing::info;

use super::{meta_client, remote_timeout};
use crate::output::{get_formatter, plural, OutputFormat};

/// Sync command with clap options
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Directory to synchronize (overrides sync.base_dir)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Block size in bytes (overrides sync.block_size)
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Metadata store address, repeat for each replica (overrides remote.meta_store_addrs)
    #[arg(long = "meta", value_name = "ADDR")]
    pub meta: Vec<String>,
}

impl SyncCommand {
    /// Execute the sync command
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = self.effective_config(config)?;

        tokio::fs::create_dir_all(&config.sync.base_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create base directory {}",
                    config.sync.base_dir.display()
                )
            })?;

        // Step 1: Find the block store through the metadata store
        let meta = Arc::new(meta_client(&config)?);
        let block_store_addr = meta
            .get_block_store_addr()
            .await
            .context("Failed to get the block store address")?;
        info!(block_store = %block_store_addr, "Block store discovered");

        let blocks = Arc::new(
            BlockStoreClient::new(&block_store_addr, remote_timeout(&config))
                .context("Failed to create block store client")?,
        );

        // Step 2: Open the local index
        let pool = DatabasePool::new(&config.index_path())
            .await
            .context("Failed to open local index")?;
        let index = Arc::new(SqliteLocalIndex::new(pool.pool().clone()));

        // Step 3: Run one pass
        let fs = Arc::new(LocalFileSystemAdapter::new(
            config.sync.base_dir.clone(),
            config.sync.index_file.clone(),
        ));
        let block_size = BlockSize::new(config.sync.block_size)?;
        let engine = SyncEngine::new(meta, blocks, fs, index, block_size);

        formatter.info(&format!(
            "Synchronizing {}...",
            config.sync.base_dir.display()
        ));
        let report = engine.sync().await.context("Sync pass failed")?;

        // Step 4: Display results
        if format.is_json() {
            formatter.print_json(&report_json(&report, &block_store_addr));
        } else {
            print_report(&report, format);
        }

        Ok(())
    }

    /// Config with this command's flags applied, validated
    pub fn effective_config(&self, config: &Config) -> Result<Config> {
        let mut builder = ConfigBuilder::from_config(config.clone());
        if let Some(dir) = &self.base_dir {
            builder = builder.base_dir(dir.clone());
        }
        if let Some(size) = self.block_size {
            builder = builder.block_size(size);
        }
        if !self.meta.is_empty() {
            builder = builder.meta_store_addrs(self.meta.clone());
        }

        builder.build_validated().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow::anyhow!("Invalid configuration: {}", messages.join("; "))
        })
    }
}

fn report_json(report: &SyncReport, block_store_addr: &str) -> serde_json::Value {
    serde_json::json!({
        "uploaded": report.uploaded,
        "downloaded": report.downloaded,
        "deleted_local": report.deleted_local,
        "deleted_remote": report.deleted_remote,
        "conflicts": report.conflicts,
        "blocks_uploaded": report.blocks_uploaded,
        "blocks_skipped": report.blocks_skipped,
        "duration_ms": report.duration_ms,
        "block_store": block_store_addr,
    })
}

fn print_report(report: &SyncReport, format: OutputFormat) {
    let formatter = get_formatter(format);

    let duration_display = if report.duration_ms >= 1000 {
        format!("{:.1}s", report.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", report.duration_ms)
    };

    if report.is_noop() {
        formatter.success("Already up to date");
        return;
    }
    formatter.success(&format!("Sync completed in {}", duration_display));

    if report.uploaded > 0 {
        formatter.info(&format!(
            "Uploaded:   {} ({} sent, {} already stored)",
            plural(report.uploaded, "file"),
            plural(report.blocks_uploaded, "block"),
            report.blocks_skipped
        ));
    }
    if report.downloaded > 0 {
        formatter.info(&format!("Downloaded: {}", plural(report.downloaded, "file")));
    }
    if report.deleted_remote > 0 {
        formatter.info(&format!(
            "Deleted remotely: {}",
            plural(report.deleted_remote, "file")
        ));
    }
    if report.deleted_local > 0 {
        formatter.info(&format!(
            "Deleted locally:  {}",
            plural(report.deleted_local, "file")
        ));
    }
    if report.conflicts > 0 {
        formatter.warn(&format!(
            "{} lost a version race; the stored version was downloaded",
            plural(report.conflicts, "file")
        ));
    }
}
