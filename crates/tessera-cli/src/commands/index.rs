//! Index command - Show the local index
//!
//! Prints the last converged view recorded by `tessera sync`, one line per
//! tracked file, tombstones included.

use anyhow::{Context, Result};
use clap::Args;
use tessera_cache::{DatabasePool, SqliteLocalIndex};
use tessera_core::config::Config;
use tessera_core::domain::IndexMap;
use tessera_core::ports::ILocalIndex;
use tracing::info;

use super::print_index;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct IndexCommand {
    /// Base directory holding the index (overrides sync.base_dir)
    #[arg(long)]
    pub base_dir: Option<std::path::PathBuf>,
}

impl IndexCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let mut config = config.clone();
        if let Some(dir) = &self.base_dir {
            config.sync.base_dir = dir.clone();
        }
        let path = config.index_path();
        info!(index = %path.display(), "Reading local index");

        // Never create an index just to show it.
        let index = if path.exists() {
            let pool = DatabasePool::new(&path)
                .await
                .context("Failed to open local index")?;
            SqliteLocalIndex::new(pool.pool().clone())
                .load()
                .await
                .context("Failed to read local index")?
        } else {
            formatter.info(&format!("No local index at {}", path.display()));
            IndexMap::new()
        };

        print_index(formatter.as_ref(), format, "Local index", &index)
    }
}
