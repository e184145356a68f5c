//! Tessera Sync - Reconciliation engine
//!
//! Provides:
//! - One-shot sync passes between a base directory and the remote stores
//! - Optimistic pushes resolved by the metadata store's compare-and-swap
//! - Download-and-overwrite conflict resolution
//!
//! ## Modules
//!
//! - [`engine`] - The sync pass (classify, reconcile, persist)
//! - [`filesystem`] - Flat base-directory adapter with atomic writes
//! - [`scanner`] - Hashes every tracked file into its block list

pub mod engine;
pub mod filesystem;
pub mod scanner;

use tessera_core::domain::{DomainError, FileName, StoreError};
use thiserror::Error;

pub use engine::{SyncEngine, SyncReport};
pub use filesystem::LocalFileSystemAdapter;

/// Errors that abort a sync pass
///
/// A pass that fails never rewrites the local index, so running the whole
/// pass again is always safe.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local filesystem adapter failed
    #[error("Local filesystem error: {0:#}")]
    Io(anyhow::Error),

    /// A block or metadata store call failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The local index could not be loaded or written
    #[error("Local index error: {0:#}")]
    Index(anyhow::Error),

    /// A domain-level error propagated from tessera-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A file no longer matches the block list computed when it was scanned
    #[error("File '{file}' changed while it was being uploaded")]
    ContentChanged { file: FileName },

    /// A fetched block does not hash to the identifier it was requested by
    #[error("Block {hash} of '{file}' is corrupt")]
    CorruptBlock { file: FileName, hash: String },
}
