//! Metadata store port (driven/secondary port)
//!
//! Each call is atomic with respect to other calls on the same store.
//! A replicated deployment may answer with [`StoreError::NotLeader`]; remote
//! adapters hide leader discovery behind this trait so the sync engine never
//! sees which endpoint served the call.

use crate::domain::{FileMetaData, IndexMap, StoreError, UpdateOutcome};

/// Port trait for the versioned metadata store
#[async_trait::async_trait]
pub trait IMetaStore: Send + Sync {
    /// Full snapshot of every file record, tombstones included
    async fn get_file_info_map(&self) -> Result<IndexMap, StoreError>;

    /// Compare-and-swap update of one file record
    ///
    /// A version mismatch is not an error: it returns
    /// [`UpdateOutcome::Rejected`].
    async fn update_file(&self, meta: &FileMetaData) -> Result<UpdateOutcome, StoreError>;

    /// Address of the block store clients of this deployment must use
    async fn get_block_store_addr(&self) -> Result<String, StoreError>;
}
