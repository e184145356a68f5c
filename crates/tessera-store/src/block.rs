//! Content-addressable block store

use std::collections::{HashMap, HashSet};

use tessera_core::domain::{Block, BlockHash, StoreError};
use tessera_core::ports::IBlockStore;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// In-memory block store keyed by content hash
///
/// Append-only: blocks are never edited or removed.
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: Mutex<HashMap<BlockHash, Block>>,
}

impl BlockStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blocks held
    pub async fn len(&self) -> usize {
        self.blocks.lock().await.len()
    }

    /// Returns true if the store holds no block
    pub async fn is_empty(&self) -> bool {
        self.blocks.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl IBlockStore for BlockStore {
    async fn get_block(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        let blocks = self.blocks.lock().await;
        match blocks.get(hash) {
            Some(block) => {
                trace!(hash = %hash.short(), size = block.size(), "Block served");
                Ok(block.clone())
            }
            None => {
                debug!(hash = %hash.short(), "Block not found");
                Err(StoreError::NotFound(hash.clone()))
            }
        }
    }

    async fn put_block(&self, block: &Block) -> Result<(), StoreError> {
        let hash = block.hash();
        let mut blocks = self.blocks.lock().await;
        trace!(hash = %hash.short(), size = block.size(), "Block stored");
        blocks.insert(hash, block.clone());
        Ok(())
    }

    async fn has_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, StoreError> {
        let blocks = self.blocks.lock().await;
        let mut seen = HashSet::new();
        let present: Vec<BlockHash> = hashes
            .iter()
            .filter(|h| blocks.contains_key(*h) && seen.insert(*h))
            .cloned()
            .collect();
        trace!(asked = hashes.len(), present = present.len(), "Probed blocks");
        Ok(present)
    }
}
