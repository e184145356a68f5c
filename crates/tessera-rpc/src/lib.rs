//! Tessera RPC - HTTP transport for the store services
//!
//! Provides:
//! - [`StoreServer`] - hyper server exposing a block store and/or a metadata
//!   store over HTTP/1.1 + JSON
//! - [`BlockStoreClient`] - `IBlockStore` adapter talking to one fixed address
//! - [`MetaStoreClient`] - `IMetaStore` adapter that locates the metadata
//!   leader among several replicas
//! - [`LeaderResolver`] - pluggable endpoint-ordering strategy for leader
//!   discovery, with [`SequentialResolver`] as the default
//!
//! ## Modules
//!
//! - [`wire`] - request/response bodies shared by server and clients
//! - [`server`] - HTTP routing onto the port traits
//! - [`client`] - reqwest-based port adapters
//! - [`leader`] - leader discovery strategies

pub mod client;
pub mod leader;
pub mod server;
pub mod wire;

pub use client::{BlockStoreClient, MetaStoreClient};
pub use leader::{LeaderResolver, SequentialResolver};
pub use server::{body_limit_for, StoreServer, DEFAULT_BODY_LIMIT};

/// Normalizes a configured address into a base URL
///
/// Bare `host:port` addresses get an `http://` scheme; trailing slashes are
/// dropped.
pub fn base_url(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
