//! Local index port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - The index is never patched: each pass replaces it wholesale so it
//!   always holds one self-consistent converged state.

use crate::domain::IndexMap;

/// Port trait for the client's persisted last-synced view
#[async_trait::async_trait]
pub trait ILocalIndex: Send + Sync {
    /// Loads the stored index, empty if none was ever written
    async fn load(&self) -> anyhow::Result<IndexMap>;

    /// Atomically replaces the stored index with `index`
    async fn replace_all(&self, index: &IndexMap) -> anyhow::Result<()>;
}
