//! Tessera configuration
//!
//! One YAML file drives both binaries: the `sync` and `remote` sections
//! configure the client, `server` configures `tesserad`, and `logging` is
//! shared. Every field has a default, so an absent file is a valid setup.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Tessera.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Client synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory mirrored against the remote index.
    pub base_dir: PathBuf,
    /// Fixed block size in bytes. Must match every other client.
    pub block_size: usize,
    /// Name of the local index file inside `base_dir`.
    pub index_file: String,
}

/// Remote store endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Candidate metadata store endpoints, tried in order to find the leader.
    pub meta_store_addrs: Vec<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

/// Services a server process can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Meta,
    Block,
    Both,
}

impl ServiceKind {
    /// Whether the metadata store is hosted
    pub fn hosts_meta(self) -> bool {
        matches!(self, ServiceKind::Meta | ServiceKind::Both)
    }

    /// Whether the block store is hosted
    pub fn hosts_block(self) -> bool {
        matches!(self, ServiceKind::Block | ServiceKind::Both)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceKind::Meta => "meta",
            ServiceKind::Block => "block",
            ServiceKind::Both => "both",
        };
        f.write_str(s)
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "meta" => Ok(ServiceKind::Meta),
            "block" => Ok(ServiceKind::Block),
            "both" => Ok(ServiceKind::Both),
            other => Err(format!(
                "invalid service type '{other}', expected meta, block or both"
            )),
        }
    }
}

/// Store server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Hosted services.
    pub service: ServiceKind,
    /// TCP port to listen on.
    pub port: u16,
    /// Bind to localhost only.
    pub local_only: bool,
    /// Block store address advertised by the metadata store.
    pub block_store_addr: String,
    /// Whether this metadata replica accepts calls as the leader.
    pub leader: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("invalid YAML in {}", path.display()))
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/tessera/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tessera")
            .join("config.yaml")
    }

    /// Full path of the local index file.
    pub fn index_path(&self) -> PathBuf {
        self.sync.base_dir.join(&self.sync.index_file)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./tessera"),
            block_size: 4096,
            index_file: "index.db".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            meta_store_addrs: vec!["localhost:8080".to_string()],
            timeout_secs: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: ServiceKind::Both,
            port: 8080,
            local_only: false,
            block_store_addr: "localhost:8080".to_string(),
            leader: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.block_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.block_size == 0 {
            errors.push(ValidationError {
                field: "sync.block_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.index_file.is_empty()
            || self.sync.index_file.contains('/')
            || self.sync.index_file.contains('\\')
        {
            errors.push(ValidationError {
                field: "sync.index_file".into(),
                message: format!(
                    "must be a plain file name, got '{}'",
                    self.sync.index_file
                ),
            });
        }

        // --- remote ---
        if self.remote.meta_store_addrs.is_empty() {
            errors.push(ValidationError {
                field: "remote.meta_store_addrs".into(),
                message: "at least one metadata store address is required".into(),
            });
        }
        if self.remote.meta_store_addrs.iter().any(|a| a.trim().is_empty()) {
            errors.push(ValidationError {
                field: "remote.meta_store_addrs".into(),
                message: "addresses must not be empty".into(),
            });
        }
        if self.remote.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- server ---
        if self.server.service.hosts_meta() && self.server.block_store_addr.trim().is_empty() {
            errors.push(ValidationError {
                field: "server.block_store_addr".into(),
                message: "required when hosting the metadata store".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn base_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.base_dir = dir;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.config.sync.block_size = size;
        self
    }

    pub fn index_file(mut self, name: impl Into<String>) -> Self {
        self.config.sync.index_file = name.into();
        self
    }

    // --- remote ---

    pub fn meta_store_addrs(mut self, addrs: Vec<String>) -> Self {
        self.config.remote.meta_store_addrs = addrs;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.timeout_secs = secs;
        self
    }

    // --- server ---

    pub fn service(mut self, service: ServiceKind) -> Self {
        self.config.server.service = service;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn local_only(mut self, local_only: bool) -> Self {
        self.config.server.local_only = local_only;
        self
    }

    pub fn block_store_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server.block_store_addr = addr.into();
        self
    }

    pub fn leader(mut self, leader: bool) -> Self {
        self.config.server.leader = leader;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
