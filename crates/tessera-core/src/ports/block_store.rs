//! Block store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses the typed [`StoreError`] because the sync engine must tell
//!   `NotFound` (fatal protocol violation) apart from transport failures.
//! - `put_block` is idempotent: re-putting identical bytes is a no-op.
//! - `has_blocks` gives no atomicity: its answer may be stale as soon as it
//!   returns. A later `put_block` is always safe.

use crate::domain::{Block, BlockHash, StoreError};

/// Port trait for the content-addressable block store
#[async_trait::async_trait]
pub trait IBlockStore: Send + Sync {
    /// Returns the block stored under `hash`
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such block exists
    async fn get_block(&self, hash: &BlockHash) -> Result<Block, StoreError>;

    /// Stores a block keyed by the hash of its content
    async fn put_block(&self, block: &Block) -> Result<(), StoreError>;

    /// Returns exactly the subset of `hashes` that the store holds
    async fn has_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, StoreError>;
}
