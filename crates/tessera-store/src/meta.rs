//! Versioned metadata store with compare-and-swap updates

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tessera_core::domain::file_meta::resolve_update;
use tessera_core::domain::{FileMetaData, IndexMap, StoreError, UpdateOutcome};
use tessera_core::ports::IMetaStore;
use tokio::sync::Mutex;
use tracing::{debug, info};

// ============================================================================
// Leadership
// ============================================================================

/// Shared flag telling a metadata replica whether it currently leads
///
/// The consensus layer that would drive this flag is external; the store only
/// observes it. A follower answers every call with [`StoreError::NotLeader`].
#[derive(Debug, Clone)]
pub struct Leadership {
    leader: Arc<AtomicBool>,
}

impl Leadership {
    /// Handle starting as leader
    pub fn leader() -> Self {
        Self {
            leader: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Handle starting as follower
    pub fn follower() -> Self {
        Self {
            leader: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    /// Flip the replica's role; visible to every clone of this handle
    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }
}

impl Default for Leadership {
    fn default() -> Self {
        Self::leader()
    }
}

// ============================================================================
// MetaStore
// ============================================================================

/// In-memory metadata store
///
/// Records are never removed: a deletion is stored as a tombstone so the
/// version lineage survives.
#[derive(Debug)]
pub struct MetaStore {
    files: Mutex<IndexMap>,
    block_store_addr: String,
    endpoint: String,
    leadership: Leadership,
}

impl MetaStore {
    /// Creates a leading store advertising `block_store_addr`
    pub fn new(block_store_addr: impl Into<String>) -> Self {
        Self::with_leadership(block_store_addr, Leadership::leader())
    }

    /// Creates a store whose role follows `leadership`
    pub fn with_leadership(block_store_addr: impl Into<String>, leadership: Leadership) -> Self {
        Self {
            files: Mutex::new(IndexMap::new()),
            block_store_addr: block_store_addr.into(),
            endpoint: "local".to_string(),
            leadership,
        }
    }

    /// Label reported in [`StoreError::NotLeader`]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Handle to this replica's role
    pub fn leadership(&self) -> &Leadership {
        &self.leadership
    }

    fn ensure_leader(&self) -> Result<(), StoreError> {
        if self.leadership.is_leader() {
            Ok(())
        } else {
            debug!(endpoint = %self.endpoint, "Refusing call: not the leader");
            Err(StoreError::NotLeader {
                endpoint: self.endpoint.clone(),
            })
        }
    }
}

#[async_trait::async_trait]
impl IMetaStore for MetaStore {
    async fn get_file_info_map(&self) -> Result<IndexMap, StoreError> {
        self.ensure_leader()?;
        let files = self.files.lock().await;
        debug!(files = files.len(), "Serving file info map");
        Ok(files.clone())
    }

    async fn update_file(&self, meta: &FileMetaData) -> Result<UpdateOutcome, StoreError> {
        self.ensure_leader()?;
        let mut files = self.files.lock().await;
        let (outcome, stored) = resolve_update(files.get(&meta.filename), meta);

        match (outcome, stored) {
            (UpdateOutcome::Accepted(version), Some(record)) => {
                info!(
                    file = %meta.filename,
                    version = %version,
                    tombstone = record.is_tombstone(),
                    "File record updated"
                );
                files.insert(record.filename.clone(), record);
            }
            _ => {
                info!(
                    file = %meta.filename,
                    candidate = %meta.version,
                    current = ?files.get(&meta.filename).map(|m| m.version.get()),
                    "File update rejected"
                );
            }
        }
        Ok(outcome)
    }

    async fn get_block_store_addr(&self) -> Result<String, StoreError> {
        self.ensure_leader()?;
        Ok(self.block_store_addr.clone())
    }
}
