//! CLI subcommands and the adapter wiring they share

pub mod config;
pub mod index;
pub mod remote;
pub mod sync;

use std::time::Duration;

use anyhow::{Context, Result};
use tessera_core::config::Config;
use tessera_core::domain::{FileMetaData, IndexMap};
use tessera_rpc::MetaStoreClient;

use crate::output::{OutputFormat, OutputFormatter};

/// Per-call timeout configured for remote stores
pub(crate) fn remote_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.remote.timeout_secs)
}

/// Metadata client over every configured replica
pub(crate) fn meta_client(config: &Config) -> Result<MetaStoreClient> {
    MetaStoreClient::new(
        config.remote.meta_store_addrs.clone(),
        remote_timeout(config),
    )
    .context("Failed to create metadata store client")
}

/// One-line description of a record
pub(crate) fn describe(record: &FileMetaData) -> String {
    match record.block_list.hashes() {
        None => format!("{}  v{}  deleted", record.filename, record.version),
        Some(hashes) => format!(
            "{}  v{}  {} block{}",
            record.filename,
            record.version,
            hashes.len(),
            if hashes.len() == 1 { "" } else { "s" }
        ),
    }
}

/// Prints an index either as a listing or as one JSON document
pub(crate) fn print_index(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    title: &str,
    index: &IndexMap,
) -> Result<()> {
    if format.is_json() {
        let json = serde_json::to_value(index).context("Failed to serialize index to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    let deleted = index.values().filter(|r| r.is_tombstone()).count();
    formatter.success(&format!(
        "{} ({} file{}, {} deleted)",
        title,
        index.len() - deleted,
        if index.len() - deleted == 1 { "" } else { "s" },
        deleted
    ));
    for record in index.values() {
        formatter.info(&describe(record));
    }
    Ok(())
}
