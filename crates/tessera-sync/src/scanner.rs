//! Directory scanner
//!
//! Reads every tracked file and splits it with the fixed chunking rule,
//! producing the `filename -> block list` view a pass classifies against the
//! local index.

use std::collections::BTreeMap;

use tessera_core::domain::{hash_blocks, BlockHash, BlockSize, FileName};
use tessera_core::ports::ILocalFileSystem;
use tracing::{debug, instrument};

use crate::SyncError;

/// Freshly hashed block lists of every tracked local file
pub type LocalScan = BTreeMap<FileName, Vec<BlockHash>>;

/// Hashes every file the adapter lists
#[instrument(skip(fs))]
pub async fn scan(fs: &dyn ILocalFileSystem, block_size: BlockSize) -> Result<LocalScan, SyncError> {
    let mut scanned = LocalScan::new();
    for name in fs.list_files().await.map_err(SyncError::Io)? {
        let data = fs.read_file(&name).await.map_err(SyncError::Io)?;
        let hashes = hash_blocks(&data, block_size);
        debug!(file = %name, bytes = data.len(), blocks = hashes.len(), "file hashed");
        scanned.insert(name, hashes);
    }
    Ok(scanned)
}
