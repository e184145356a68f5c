//! Tessera Cache - SQLite-backed local index
//!
//! Persists the client's last converged view of every tracked file, one row
//! per block hash, so the next pass can tell new, changed and deleted files
//! apart. [`SqliteLocalIndex`] implements the `ILocalIndex` port on top of a
//! [`DatabasePool`].
//!
//! ```no_run
//! use std::path::Path;
//! use tessera_cache::{DatabasePool, SqliteLocalIndex};
//! use tessera_core::ports::ILocalIndex;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/srv/tessera/index.db")).await?;
//! let index = SqliteLocalIndex::new(pool.pool().clone());
//! let files = index.load().await?;
//! println!("{} files tracked", files.len());
//! # Ok(())
//! # }
//! ```

pub mod index;
pub mod pool;

pub use index::SqliteLocalIndex;
pub use pool::DatabasePool;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be mapped back to domain types
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
