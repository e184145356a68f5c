//! Shared test helpers for transport integration tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::domain::{BlockHash, FileMetaData, FileName, Version};
use tessera_rpc::StoreServer;
use tessera_store::{BlockStore, Leadership, MetaStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A store server running on an ephemeral loopback port
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub leadership: Leadership,
}

impl RunningServer {
    pub fn address(&self) -> String {
        self.addr.to_string()
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Starts a server hosting the requested services
pub async fn start_server(block: bool, meta: bool) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let leadership = Leadership::leader();

    let mut server = StoreServer::new();
    if block {
        server = server.with_block_store(Arc::new(BlockStore::new()));
    }
    if meta {
        let store = MetaStore::with_leadership(addr.to_string(), leadership.clone());
        server = server.with_meta_store(Arc::new(store));
    }

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        server.serve(listener, token).await.unwrap();
    });

    RunningServer {
        addr,
        shutdown,
        leadership,
    }
}

pub fn name(s: &str) -> FileName {
    s.parse().unwrap()
}

pub fn v(n: u32) -> Version {
    Version::new(n).unwrap()
}

pub fn record(file: &str, n: u32, content: &[u8]) -> FileMetaData {
    FileMetaData::new(name(file), v(n), vec![BlockHash::of(content)])
}
