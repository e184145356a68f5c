//! Domain and store error types
//!
//! [`DomainError`] covers validation failures of domain values.
//! [`StoreError`] is the typed failure of every Block Store and Metadata
//! Store call, whether the store is in-process or remote.

use thiserror::Error;

use super::newtypes::BlockHash;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid block hash format (expected lowercase hex SHA-256)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid file name (empty, contains a separator, or reserved)
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// Invalid version number
    #[error("Invalid version: {0}")]
    InvalidVersion(i64),

    /// Block size must be positive
    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),

    /// A block's declared size disagrees with its payload
    #[error("Block size mismatch: declared {declared}, actual {actual}")]
    BlockSizeMismatch {
        /// Size carried by the block record
        declared: usize,
        /// Length of the data payload
        actual: usize,
    },
}

/// Errors returned by Block Store and Metadata Store operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested block does not exist in the store
    #[error("Block not found: {0}")]
    NotFound(BlockHash),

    /// The contacted metadata replica is not the current leader
    #[error("Endpoint {endpoint} is not the leader")]
    NotLeader {
        /// Address of the replica that refused the call
        endpoint: String,
    },

    /// Every known metadata endpoint refused the call
    #[error("No leader found among {tried} metadata endpoint(s)")]
    NoLeader {
        /// Number of endpoints attempted
        tried: usize,
    },

    /// The call did not complete within the configured timeout
    #[error("Call to {endpoint} timed out")]
    Timeout {
        /// Address of the unresponsive endpoint
        endpoint: String,
    },

    /// Connection or HTTP-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer answered with something that violates the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Returns true for the leader-redirect signal
    pub fn is_not_leader(&self) -> bool {
        matches!(self, StoreError::NotLeader { .. })
    }
}

impl From<DomainError> for StoreError {
    fn from(e: DomainError) -> Self {
        StoreError::Protocol(e.to_string())
    }
}
