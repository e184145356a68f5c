//! Tessera Daemon - Block and metadata store server
//!
//! Hosts an in-memory block store, metadata store, or both behind the HTTP
//! store API, until SIGINT or SIGTERM.
//!
//! ```text
//! tesserad -s <meta|block|both> -p <port> [-l] [-d] [--follower] [block_store_addr]
//! ```
//!
//! A usage error exits with status 64 (`EX_USAGE`).

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tessera_core::config::{Config, ServerConfig, ServiceKind};
use tessera_rpc::{body_limit_for, StoreServer};
use tessera_store::{BlockStore, Leadership, MetaStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status for command-line usage errors
const EX_USAGE: u8 = 64;

#[derive(Debug, Parser)]
#[command(name = "tesserad", version, about = "Tessera block and metadata store server")]
struct ServerArgs {
    /// Services to host
    #[arg(short = 's', long, value_name = "meta|block|both")]
    service: Option<ServiceKind>,

    /// Port to listen on
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Only listen on localhost
    #[arg(short = 'l', long)]
    local_only: bool,

    /// Debug logging
    #[arg(short = 'd', long)]
    debug: bool,

    /// Start this metadata replica as a follower
    #[arg(long)]
    follower: bool,

    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block store address advertised by the metadata store
    block_store_addr: Option<String>,
}

impl ServerArgs {
    /// Applies the flags on top of the `server` config section
    fn resolve(&self, mut server: ServerConfig) -> ServerConfig {
        if let Some(service) = self.service {
            server.service = service;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        server.local_only |= self.local_only;
        if self.follower {
            server.leader = false;
        }

        match &self.block_store_addr {
            Some(addr) => server.block_store_addr = addr.clone(),
            // A combined server advertises itself.
            None if server.service == ServiceKind::Both => {
                server.block_store_addr = format!("localhost:{}", server.port);
            }
            None => {}
        }
        server
    }
}

/// Socket the server binds for `server`
fn bind_addr(server: &ServerConfig) -> SocketAddr {
    let ip = if server.local_only {
        Ipv4Addr::LOCALHOST
    } else {
        Ipv4Addr::UNSPECIFIED
    };
    SocketAddr::from((ip, server.port))
}

/// Builds the HTTP server hosting the configured stores
///
/// Request bodies are bounded by what a client chunking with `block_size`
/// can send.
fn build_server(server: &ServerConfig, block_size: usize) -> StoreServer {
    let mut store_server = StoreServer::new().with_body_limit(body_limit_for(block_size));

    if server.service.hosts_block() {
        store_server = store_server.with_block_store(Arc::new(BlockStore::new()));
    }
    if server.service.hosts_meta() {
        let leadership = if server.leader {
            Leadership::leader()
        } else {
            Leadership::follower()
        };
        let meta = MetaStore::with_leadership(server.block_store_addr.clone(), leadership)
            .with_endpoint(bind_addr(server).to_string());
        store_server = store_server.with_meta_store(Arc::new(meta));
    }

    store_server
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

async fn run(server: ServerConfig, block_size: usize) -> Result<()> {
    let addr = bind_addr(&server);
    let store_server = build_server(&server, block_size);

    info!(
        service = %server.service,
        %addr,
        leader = server.leader,
        block_store_addr = %server.block_store_addr,
        "Tessera server starting (tesserad)"
    );

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    store_server
        .run(addr, shutdown_token)
        .await
        .with_context(|| format!("Store server on {addr} failed"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match ServerArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EX_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = if args.debug { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path);
    config.server = args.resolve(config.server);

    let errors: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|e| e.field.starts_with("server."))
        .collect();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("tesserad: {e}");
        }
        return ExitCode::from(EX_USAGE);
    }

    match run(config.server, config.sync.block_size).await {
        Ok(()) => {
            info!("Tessera server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            warn!(error = %e, "Tessera server exiting with error");
            eprintln!("tesserad: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
