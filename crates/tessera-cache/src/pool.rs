//! SQLite pool for the local index
//!
//! The index database sits inside the synchronized directory, so it uses the
//! rollback journal: no `-wal`/`-shm` files linger next to user files once a
//! transaction finishes. The schema is applied on every open.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Single-connection pool over the index database
///
/// One sync pass is the only writer. The busy timeout covers a second client
/// process pointed at the same directory.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the index database at `db_path`, creating the file and its
    /// parent directory when missing
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .busy_timeout(Duration::from_secs(5));

        let pool = Self::open(options, &db_path.display().to_string()).await?;
        tracing::debug!(path = %db_path.display(), "Index database opened");
        Ok(pool)
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(format!(":memory:: {e}")))?;
        Self::open(options, ":memory:").await
    }

    /// Underlying sqlx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn open(options: SqliteConnectOptions, label: &str) -> Result<Self, CacheError> {
        // In-memory databases are per connection, so one connection for both modes.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("{label}: {e}")))?;

        sqlx::raw_sql(include_str!("migrations/0001_indexes.sql"))
            .execute(&pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("indexes table: {e}")))?;

        Ok(Self { pool })
    }
}
