//! HTTP server exposing the store services
//!
//! Routes every request of the store API (see [`crate::wire`]) onto an
//! [`IBlockStore`] and/or an [`IMetaStore`]. A service the process does not
//! host answers `404`, as does any unknown path.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tessera_core::domain::{Block, FileMetaData, StoreError};
use tessera_core::ports::{IBlockStore, IMetaStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::wire::{
    BlockBody, BlockStoreAddrResponse, ErrorBody, FileInfoMapResponse, GetBlockRequest,
    HashesBody, PutBlockResponse, UpdateFileResponse, ERROR_BAD_REQUEST, ERROR_INTERNAL,
    ERROR_NOT_FOUND, ERROR_TOO_LARGE, ERROR_NOT_LEADER, PATH_BLOCK_STORE_ADDR, PATH_FILE_INFO_MAP,
    PATH_GET_BLOCK, PATH_HAS_BLOCKS, PATH_PUT_BLOCK, PATH_UPDATE_FILE,
};

type HttpResponse = Response<Full<Bytes>>;

/// Request body limit when none is configured
pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Request body limit for clients chunking with `block_size`
///
/// A put carries one base64 block plus a small JSON envelope. The limit
/// never drops below [`DEFAULT_BODY_LIMIT`], which bounds hash lists and
/// file records.
pub fn body_limit_for(block_size: usize) -> usize {
    let encoded = block_size.div_ceil(3).saturating_mul(4);
    encoded.saturating_add(1024).max(DEFAULT_BODY_LIMIT)
}

/// Services hosted by one server process
#[derive(Clone)]
struct Services {
    block: Option<Arc<dyn IBlockStore>>,
    meta: Option<Arc<dyn IMetaStore>>,
    body_limit: usize,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            block: None,
            meta: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// HTTP server for a block store, a metadata store, or both
#[derive(Clone, Default)]
pub struct StoreServer {
    services: Services,
}

impl StoreServer {
    /// Creates a server hosting no service
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts `store` under `/block/*`
    pub fn with_block_store(mut self, store: Arc<dyn IBlockStore>) -> Self {
        self.services.block = Some(store);
        self
    }

    /// Hosts `store` under `/meta/*`
    pub fn with_meta_store(mut self, store: Arc<dyn IMetaStore>) -> Self {
        self.services.meta = Some(store);
        self
    }

    /// Rejects request bodies larger than `bytes` with `413`
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.services.body_limit = bytes;
        self
    }

    /// Binds `addr` and serves until `shutdown` is cancelled
    pub async fn run(&self, addr: SocketAddr, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections accepted on `listener` until `shutdown` is cancelled
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(
            addr = %listener.local_addr()?,
            block = self.services.block.is_some(),
            meta = self.services.meta.is_some(),
            "Store server listening"
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = result?;
                    let io = TokioIo::new(stream);
                    let services = self.services.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let services = services.clone();
                            async move { Ok::<_, hyper::Error>(handle_request(req, &services).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, %peer, "Store HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Store server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Routing
// ============================================================================

async fn handle_request(req: Request<Incoming>, services: &Services) -> HttpResponse {
    let path = req.uri().path().to_string();
    if req.method() != Method::POST {
        return error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            ERROR_BAD_REQUEST,
            format!("{} not allowed", req.method()),
        );
    }

    let body = match Limited::new(req.into_body(), services.body_limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(path = %path, limit = services.body_limit, "Request body too large");
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                ERROR_TOO_LARGE,
                format!("request body exceeds {} bytes", services.body_limit),
            );
        }
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return error_response(StatusCode::BAD_REQUEST, ERROR_BAD_REQUEST, e.to_string());
        }
    };

    debug!(path = %path, bytes = body.len(), "Store request");

    match path.as_str() {
        PATH_GET_BLOCK | PATH_PUT_BLOCK | PATH_HAS_BLOCKS => match &services.block {
            Some(store) => handle_block(&path, &body, store.as_ref()).await,
            None => not_found(&path),
        },
        PATH_FILE_INFO_MAP | PATH_UPDATE_FILE | PATH_BLOCK_STORE_ADDR => match &services.meta {
            Some(store) => handle_meta(&path, &body, store.as_ref()).await,
            None => not_found(&path),
        },
        _ => not_found(&path),
    }
}

async fn handle_block(path: &str, body: &[u8], store: &dyn IBlockStore) -> HttpResponse {
    match path {
        PATH_GET_BLOCK => {
            let req: GetBlockRequest = match parse(body) {
                Ok(req) => req,
                Err(resp) => return resp,
            };
            match store.get_block(&req.hash).await {
                Ok(block) => json_response(StatusCode::OK, &BlockBody::from(&block)),
                Err(e) => store_error_response(e),
            }
        }
        PATH_PUT_BLOCK => {
            let req: BlockBody = match parse(body) {
                Ok(req) => req,
                Err(resp) => return resp,
            };
            let block = match Block::try_from(req) {
                Ok(block) => block,
                Err(e) => {
                    return error_response(StatusCode::BAD_REQUEST, ERROR_BAD_REQUEST, e.to_string())
                }
            };
            match store.put_block(&block).await {
                Ok(()) => json_response(StatusCode::OK, &PutBlockResponse { flag: true }),
                Err(e) => store_error_response(e),
            }
        }
        _ => {
            let req: HashesBody = match parse(body) {
                Ok(req) => req,
                Err(resp) => return resp,
            };
            match store.has_blocks(&req.hashes).await {
                Ok(hashes) => json_response(StatusCode::OK, &HashesBody { hashes }),
                Err(e) => store_error_response(e),
            }
        }
    }
}

async fn handle_meta(path: &str, body: &[u8], store: &dyn IMetaStore) -> HttpResponse {
    match path {
        PATH_FILE_INFO_MAP => match store.get_file_info_map().await {
            Ok(file_info_map) => json_response(StatusCode::OK, &FileInfoMapResponse { file_info_map }),
            Err(e) => store_error_response(e),
        },
        PATH_UPDATE_FILE => {
            let meta: FileMetaData = match parse(body) {
                Ok(meta) => meta,
                Err(resp) => return resp,
            };
            match store.update_file(&meta).await {
                Ok(outcome) => json_response(
                    StatusCode::OK,
                    &UpdateFileResponse {
                        version: outcome.to_wire(),
                    },
                ),
                Err(e) => store_error_response(e),
            }
        }
        _ => match store.get_block_store_addr().await {
            Ok(addr) => json_response(StatusCode::OK, &BlockStoreAddrResponse { addr }),
            Err(e) => store_error_response(e),
        },
    }
}

// ============================================================================
// Response helpers
// ============================================================================

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, HttpResponse> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Malformed request body");
        error_response(StatusCode::BAD_REQUEST, ERROR_BAD_REQUEST, e.to_string())
    })
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to encode response");
            let mut response = Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> HttpResponse {
    json_response(status, &ErrorBody::new(code, message))
}

fn not_found(path: &str) -> HttpResponse {
    error_response(StatusCode::NOT_FOUND, ERROR_NOT_FOUND, format!("no route for {path}"))
}

fn store_error_response(err: StoreError) -> HttpResponse {
    match err {
        StoreError::NotLeader { .. } => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, ERROR_NOT_LEADER, "")
        }
        StoreError::NotFound(hash) => error_response(
            StatusCode::NOT_FOUND,
            ERROR_NOT_FOUND,
            format!("block {hash} not found"),
        ),
        other => {
            warn!(error = %other, "Store call failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, ERROR_INTERNAL, other.to_string())
        }
    }
}
