//! Tessera Store - In-memory store services
//!
//! Provides the two server-side key-value services:
//! - [`BlockStore`] - content hash to block bytes
//! - [`MetaStore`] - filename to versioned metadata, with compare-and-swap
//!   updates and tombstone deletion
//!
//! ## Architecture
//!
//! Both stores implement the port traits from `tessera-core`
//! (`IBlockStore`, `IMetaStore`). Each one owns its map behind a single
//! `tokio::sync::Mutex`; every operation runs to completion while holding
//! it, so calls from different clients interleave only at call boundaries.

pub mod block;
pub mod meta;

pub use block::BlockStore;
pub use meta::{Leadership, MetaStore};
