//! Tessera Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Block`, `BlockHash`, `FileMetaData`, `BlockList`, `IndexMap`
//! - **Chunking** - fixed-size block splitting and content hashing
//! - **Port definitions** - Traits for adapters: `IBlockStore`, `IMetaStore`,
//!   `ILocalIndex`, `ILocalFileSystem`
//! - **Configuration** - YAML-backed client and server settings
//!
//! # Architecture
//!
//! The domain module contains pure business rules with no I/O.
//! Ports define trait interfaces that adapter crates implement: the
//! in-memory stores (`tessera-store`), the HTTP transport (`tessera-rpc`),
//! the SQLite index (`tessera-cache`) and the local filesystem
//! (`tessera-sync`).

pub mod config;
pub mod domain;
pub mod ports;
