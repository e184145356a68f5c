//! Domain entities and business rules
//!
//! This module contains the core domain types for Tessera:
//! - Newtypes for validated identifiers (`BlockHash`, `FileName`, `Version`)
//! - Blocks and the fixed-size chunking rule
//! - File metadata records, tombstones and the version acceptance rule
//! - Domain and store error types

pub mod block;
pub mod errors;
pub mod file_meta;
pub mod newtypes;

// Re-export commonly used types
pub use block::{chunk_ranges, hash_blocks, Block, BlockSize};
pub use errors::{DomainError, StoreError};
pub use file_meta::{BlockList, FileMetaData, IndexMap, UpdateOutcome, TOMBSTONE_HASH};
pub use newtypes::{BlockHash, FileName, Version};
