//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IBlockStore`] - Content-addressable block storage
//! - [`IMetaStore`] - Versioned file metadata with compare-and-swap updates
//! - [`ILocalIndex`] - Persistence of the client's last-synced view
//! - [`ILocalFileSystem`] - Flat access to the synchronized directory

pub mod block_store;
pub mod local_filesystem;
pub mod local_index;
pub mod meta_store;

pub use block_store::IBlockStore;
pub use local_filesystem::ILocalFileSystem;
pub use local_index::ILocalIndex;
pub use meta_store::IMetaStore;
