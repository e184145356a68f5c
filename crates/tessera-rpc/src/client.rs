//! reqwest adapters for the store ports
//!
//! Every call is bounded by the client timeout; a timeout surfaces as
//! [`StoreError::Timeout`] and is never retried here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tessera_core::ports::IMetaStore;
//! use tessera_rpc::{BlockStoreClient, MetaStoreClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let timeout = Duration::from_secs(10);
//! let meta = MetaStoreClient::new(vec!["localhost:8081".into(), "localhost:8082".into()], timeout)?;
//! let addr = meta.get_block_store_addr().await?;
//! let blocks = BlockStoreClient::new(&addr, timeout)?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Bytes;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tessera_core::domain::{Block, BlockHash, FileMetaData, IndexMap, StoreError, UpdateOutcome};
use tessera_core::ports::{IBlockStore, IMetaStore};
use tracing::{debug, instrument, warn};

use crate::base_url;
use crate::leader::{LeaderResolver, SequentialResolver};
use crate::wire::{
    BlockBody, BlockStoreAddrResponse, ErrorBody, FileInfoMapResponse, GetBlockRequest,
    HashesBody, PutBlockResponse, UpdateFileResponse, ERROR_NOT_LEADER, PATH_BLOCK_STORE_ADDR,
    PATH_FILE_INFO_MAP, PATH_GET_BLOCK, PATH_HAS_BLOCKS, PATH_PUT_BLOCK, PATH_UPDATE_FILE,
};

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

fn build_http(timeout: Duration) -> Result<Client, StoreError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StoreError::Transport(format!("Failed to build HTTP client: {e}")))
}

/// Result of one POST before the success body is decoded
enum Reply {
    Ok(Bytes),
    Failed(StatusCode, ErrorBody),
}

async fn post<B: Serialize + ?Sized>(
    http: &Client,
    endpoint: &str,
    path: &str,
    body: &B,
) -> Result<Reply, StoreError> {
    let url = format!("{endpoint}{path}");
    let response = http
        .post(&url)
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(endpoint, e))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(endpoint, e))?;

    if status.is_success() {
        return Ok(Reply::Ok(bytes));
    }

    let error = serde_json::from_slice::<ErrorBody>(&bytes)
        .unwrap_or_else(|_| ErrorBody::new("", String::from_utf8_lossy(&bytes)));
    debug!(%url, %status, code = %error.error, "Store call failed");
    Ok(Reply::Failed(status, error))
}

fn decode<T: DeserializeOwned>(endpoint: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Protocol(format!("Invalid response from {endpoint}: {e}")))
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        warn!(endpoint, "Store call timed out");
        StoreError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        StoreError::Transport(format!("{endpoint}: {err}"))
    }
}

fn unexpected(endpoint: &str, status: StatusCode, error: &ErrorBody) -> StoreError {
    StoreError::Protocol(format!(
        "{endpoint} answered HTTP {status}: {} {}",
        error.error, error.message
    ))
}

// ============================================================================
// BlockStoreClient
// ============================================================================

/// Block store adapter bound to one fixed address
#[derive(Debug, Clone)]
pub struct BlockStoreClient {
    http: Client,
    endpoint: String,
}

impl BlockStoreClient {
    /// Creates a client for the block store at `addr`
    pub fn new(addr: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            http: build_http(timeout)?,
            endpoint: base_url(addr),
        })
    }

    /// Base URL this client talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl IBlockStore for BlockStoreClient {
    #[instrument(skip(self, hash), fields(hash = %hash.short()))]
    async fn get_block(&self, hash: &BlockHash) -> Result<Block, StoreError> {
        let request = GetBlockRequest { hash: hash.clone() };
        match post(&self.http, &self.endpoint, PATH_GET_BLOCK, &request).await? {
            Reply::Ok(bytes) => {
                let body: BlockBody = decode(&self.endpoint, &bytes)?;
                let block = Block::try_from(body)?;
                if block.hash() != *hash {
                    return Err(StoreError::Protocol(format!(
                        "{} returned content not matching block {}",
                        self.endpoint, hash
                    )));
                }
                Ok(block)
            }
            Reply::Failed(StatusCode::NOT_FOUND, _) => Err(StoreError::NotFound(hash.clone())),
            Reply::Failed(status, error) => Err(unexpected(&self.endpoint, status, &error)),
        }
    }

    #[instrument(skip(self, block), fields(size = block.size()))]
    async fn put_block(&self, block: &Block) -> Result<(), StoreError> {
        match post(&self.http, &self.endpoint, PATH_PUT_BLOCK, &BlockBody::from(block)).await? {
            Reply::Ok(bytes) => {
                let ack: PutBlockResponse = decode(&self.endpoint, &bytes)?;
                if ack.flag {
                    Ok(())
                } else {
                    Err(StoreError::Protocol(format!(
                        "{} refused block {}",
                        self.endpoint,
                        block.hash()
                    )))
                }
            }
            Reply::Failed(status, error) => Err(unexpected(&self.endpoint, status, &error)),
        }
    }

    #[instrument(skip(self, hashes), fields(count = hashes.len()))]
    async fn has_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<BlockHash>, StoreError> {
        let request = HashesBody {
            hashes: hashes.to_vec(),
        };
        match post(&self.http, &self.endpoint, PATH_HAS_BLOCKS, &request).await? {
            Reply::Ok(bytes) => Ok(decode::<HashesBody>(&self.endpoint, &bytes)?.hashes),
            Reply::Failed(status, error) => Err(unexpected(&self.endpoint, status, &error)),
        }
    }
}

// ============================================================================
// MetaStoreClient
// ============================================================================

/// Metadata store adapter that finds the leader among several replicas
pub struct MetaStoreClient {
    http: Client,
    resolver: Arc<dyn LeaderResolver>,
}

impl MetaStoreClient {
    /// Creates a client over `addrs` using a [`SequentialResolver`]
    pub fn new(addrs: Vec<String>, timeout: Duration) -> Result<Self, StoreError> {
        let endpoints = addrs.iter().map(|a| base_url(a)).collect();
        Ok(Self {
            http: build_http(timeout)?,
            resolver: Arc::new(SequentialResolver::new(endpoints)),
        })
    }

    /// Replaces the leader discovery strategy
    ///
    /// The resolver's candidates must already be base URLs.
    pub fn with_resolver(mut self, resolver: Arc<dyn LeaderResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Runs `call` against each candidate until one is not a follower
    async fn with_leader<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let candidates = self.resolver.candidates();
        let tried = candidates.len();

        for endpoint in candidates {
            match call(endpoint.clone()).await {
                Ok(value) => {
                    self.resolver.accepted(&endpoint);
                    return Ok(value);
                }
                Err(StoreError::NotLeader { .. }) => {
                    debug!(op, endpoint = %endpoint, "Replica is not the leader, trying next");
                    self.resolver.refused(&endpoint);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(op, tried, "No metadata replica accepted the call");
        Err(StoreError::NoLeader { tried })
    }

    async fn call_endpoint<B, T>(&self, endpoint: String, path: &str, body: &B) -> Result<T, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        match post(&self.http, &endpoint, path, body).await? {
            Reply::Ok(bytes) => decode(&endpoint, &bytes),
            Reply::Failed(StatusCode::SERVICE_UNAVAILABLE, error) if error.error == ERROR_NOT_LEADER => {
                Err(StoreError::NotLeader { endpoint })
            }
            Reply::Failed(status, error) => Err(unexpected(&endpoint, status, &error)),
        }
    }
}

impl std::fmt::Debug for MetaStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaStoreClient")
            .field("candidates", &self.resolver.candidates())
            .finish()
    }
}

#[async_trait::async_trait]
impl IMetaStore for MetaStoreClient {
    #[instrument(skip(self))]
    async fn get_file_info_map(&self) -> Result<IndexMap, StoreError> {
        let empty = serde_json::json!({});
        let response: FileInfoMapResponse = self
            .with_leader("get_file_info_map", |endpoint| {
                self.call_endpoint(endpoint, PATH_FILE_INFO_MAP, &empty)
            })
            .await?;
        Ok(response.file_info_map)
    }

    #[instrument(skip(self, meta), fields(file = %meta.filename, version = %meta.version))]
    async fn update_file(&self, meta: &FileMetaData) -> Result<UpdateOutcome, StoreError> {
        let response: UpdateFileResponse = self
            .with_leader("update_file", |endpoint| {
                self.call_endpoint(endpoint, PATH_UPDATE_FILE, meta)
            })
            .await?;
        Ok(UpdateOutcome::from_wire(response.version)?)
    }

    #[instrument(skip(self))]
    async fn get_block_store_addr(&self) -> Result<String, StoreError> {
        let empty = serde_json::json!({});
        let response: BlockStoreAddrResponse = self
            .with_leader("get_block_store_addr", |endpoint| {
                self.call_endpoint(endpoint, PATH_BLOCK_STORE_ADDR, &empty)
            })
            .await?;
        Ok(response.addr)
    }
}
