//! SQLite implementation of ILocalIndex
//!
//! ## Row Mapping
//!
//! | Record state        | Rows                                             |
//! |---------------------|--------------------------------------------------|
//! | Present, n hashes   | n rows, `hashIndex` 0..n, `hashValue` = hex hash |
//! | Present, no hashes  | 1 row, `hashIndex` 0, `hashValue` = `''`         |
//! | Deleted (tombstone) | 1 row, `hashIndex` 0, `hashValue` = `'0'`        |
//!
//! Every row of a file carries the same `version`.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use tessera_core::domain::{
    BlockHash, BlockList, FileMetaData, FileName, IndexMap, Version, TOMBSTONE_HASH,
};
use tessera_core::ports::ILocalIndex;

use crate::CacheError;

/// Stored `hashValue` of an empty file's marker row
const EMPTY_FILE_HASH: &str = "";

/// SQLite-based implementation of the local index port
pub struct SqliteLocalIndex {
    pool: SqlitePool,
}

impl SqliteLocalIndex {
    /// Creates a new index instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads every row and folds them into an [`IndexMap`]
    pub async fn read_all(&self) -> Result<IndexMap, CacheError> {
        let rows = sqlx::query(
            "SELECT fileName, version, hashIndex, hashValue FROM indexes \
             ORDER BY fileName ASC, hashIndex ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: BTreeMap<FileName, (Version, Vec<String>)> = BTreeMap::new();
        for row in &rows {
            let (name, version, hash) = row_parts(row)?;
            match grouped.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert((version, vec![hash]));
                }
                Entry::Occupied(mut slot) => {
                    let current = slot.get().0;
                    if current != version {
                        return Err(CacheError::SerializationError(format!(
                            "File '{}' has rows with versions {} and {}",
                            slot.key(),
                            current,
                            version
                        )));
                    }
                    slot.get_mut().1.push(hash);
                }
            }
        }

        let mut index = IndexMap::new();
        for (name, (version, hashes)) in grouped {
            let meta = record_from_rows(name, version, hashes)?;
            index.insert(meta.filename.clone(), meta);
        }

        tracing::debug!(files = index.len(), rows = rows.len(), "Local index loaded");
        Ok(index)
    }

    /// Truncates the table and writes `index` inside one transaction
    pub async fn write_all(&self, index: &IndexMap) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM indexes").execute(&mut *tx).await?;

        let mut rows = 0usize;
        for meta in index.values() {
            let version = i64::from(meta.version);
            for (position, value) in rows_for(&meta.block_list).into_iter().enumerate() {
                sqlx::query(
                    "INSERT INTO indexes (fileName, version, hashIndex, hashValue) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(meta.filename.as_str())
                .bind(version)
                .bind(position as i64)
                .bind(value)
                .execute(&mut *tx)
                .await?;
                rows += 1;
            }
        }

        tx.commit().await?;

        tracing::debug!(files = index.len(), rows, "Local index rewritten");
        Ok(())
    }
}

// ============================================================================
// Helper functions for row conversion
// ============================================================================

fn row_parts(row: &SqliteRow) -> Result<(FileName, Version, String), CacheError> {
    let name: String = row.try_get("fileName")?;
    let version: i64 = row.try_get("version")?;
    let hash: String = row.try_get("hashValue")?;

    let file = FileName::new(name.clone()).map_err(|e| {
        CacheError::SerializationError(format!("Invalid file name '{}': {}", name, e))
    })?;
    let version = Version::try_from(version).map_err(|e| {
        CacheError::SerializationError(format!("Invalid version for '{}': {}", name, e))
    })?;
    Ok((file, version, hash))
}

fn record_from_rows(
    name: FileName,
    version: Version,
    hashes: Vec<String>,
) -> Result<FileMetaData, CacheError> {
    if hashes.len() == 1 && hashes[0] == EMPTY_FILE_HASH {
        return Ok(FileMetaData::new(name, version, Vec::new()));
    }
    let block_list = BlockList::from_wire(hashes).map_err(|e| {
        CacheError::SerializationError(format!("Invalid hash list for '{}': {}", name, e))
    })?;
    Ok(FileMetaData {
        filename: name,
        version,
        block_list,
    })
}

fn rows_for(list: &BlockList) -> Vec<String> {
    match list {
        BlockList::Present(hashes) if hashes.is_empty() => vec![EMPTY_FILE_HASH.to_string()],
        BlockList::Present(hashes) => hashes.iter().map(BlockHash::to_string).collect(),
        BlockList::Deleted => vec![TOMBSTONE_HASH.to_string()],
    }
}

// ============================================================================
// ILocalIndex implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalIndex for SqliteLocalIndex {
    async fn load(&self) -> anyhow::Result<IndexMap> {
        Ok(self.read_all().await?)
    }

    async fn replace_all(&self, index: &IndexMap) -> anyhow::Result<()> {
        Ok(self.write_all(index).await?)
    }
}
