//! Remote command - Show the metadata store's current file map

use anyhow::{Context, Result};
use clap::Args;
use tessera_core::config::Config;
use tessera_core::ports::IMetaStore;

use super::{meta_client, print_index};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RemoteCommand {
    /// Metadata store address, repeat for each replica (overrides remote.meta_store_addrs)
    #[arg(long = "meta", value_name = "ADDR")]
    pub meta: Vec<String>,
}

impl RemoteCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let mut config = config.clone();
        if !self.meta.is_empty() {
            config.remote.meta_store_addrs = self.meta.clone();
        }

        let client = meta_client(&config)?;
        let block_store = client
            .get_block_store_addr()
            .await
            .context("Failed to get the block store address")?;
        let snapshot = client
            .get_file_info_map()
            .await
            .context("Failed to fetch the remote index")?;

        formatter.info(&format!("Block store: {}", block_store));
        print_index(formatter.as_ref(), format, "Remote index", &snapshot)
    }
}
