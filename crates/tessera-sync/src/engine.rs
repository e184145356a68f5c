//! Reconciliation engine
//!
//! The [`SyncEngine`] runs one sync pass between the base directory and the
//! remote stores. A pass works on three views:
//!
//! - `local`: the last converged state, loaded from the local index
//! - `remote`: one snapshot of the metadata store taken at pass start
//! - `scan`: every tracked file freshly hashed into its block list
//!
//! ## Sync Flow
//!
//! 1. **Classify** scanned files against `local`: new, updated or unchanged
//! 2. **Deletions**: indexed files missing on disk become tombstones
//! 3. **Reconcile remote**: download what the remote has ahead, push what is
//!    exactly one version ahead locally
//! 4. **New files** absent remotely are pushed at version 1
//! 5. **New files** already present remotely adopt the remote record
//! 6. **Updated files** not settled yet are pushed with their local version
//! 7. **Persist**: the local index is replaced wholesale
//!
//! Every push is optimistic. When the metadata store rejects it, the engine
//! re-reads the store and adopts the stored record, downloading its content.
//! Any error aborts the pass before step 7, so a failed pass can simply run
//! again.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tessera_core::domain::{
    chunk_ranges, Block, BlockHash, BlockSize, FileMetaData, FileName, IndexMap, StoreError,
    UpdateOutcome, Version,
};
use tessera_core::ports::{IBlockStore, ILocalFileSystem, ILocalIndex, IMetaStore};
use tracing::{debug, info, instrument, warn};

use crate::scanner::{self, LocalScan};
use crate::SyncError;

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of a completed sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files whose content was accepted by the metadata store
    pub uploaded: u32,
    /// Files written from remote content
    pub downloaded: u32,
    /// Local files removed because the remote record is a tombstone
    pub deleted_local: u32,
    /// Tombstones accepted by the metadata store
    pub deleted_remote: u32,
    /// Pushes rejected and resolved by adopting the stored record
    pub conflicts: u32,
    /// Blocks sent to the block store
    pub blocks_uploaded: u32,
    /// Blocks the block store already held
    pub blocks_skipped: u32,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Returns true if the pass changed nothing locally or remotely
    pub fn is_noop(&self) -> bool {
        self.uploaded == 0
            && self.downloaded == 0
            && self.deleted_local == 0
            && self.deleted_remote == 0
            && self.conflicts == 0
    }
}

// ============================================================================
// Per-pass state
// ============================================================================

/// Local changes found by steps 1 and 2
#[derive(Debug, Default)]
struct LocalChanges {
    created: BTreeSet<FileName>,
    updated: BTreeSet<FileName>,
    deleted: BTreeSet<FileName>,
}

/// Mutable state threaded through one pass
struct Pass {
    local: IndexMap,
    scan: LocalScan,
    report: SyncReport,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// One-shot reconciliation between a base directory and the remote stores
///
/// ## Dependencies
///
/// - `meta_store`: versioned file records, reached through whatever leader
///   discovery the adapter implements
/// - `block_store`: content-addressed blocks
/// - `local_filesystem`: the flat base directory
/// - `local_index`: the last converged view, rewritten at the end of a pass
pub struct SyncEngine {
    meta_store: Arc<dyn IMetaStore>,
    block_store: Arc<dyn IBlockStore>,
    local_filesystem: Arc<dyn ILocalFileSystem>,
    local_index: Arc<dyn ILocalIndex>,
    block_size: BlockSize,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given dependencies
    pub fn new(
        meta_store: Arc<dyn IMetaStore>,
        block_store: Arc<dyn IBlockStore>,
        local_filesystem: Arc<dyn ILocalFileSystem>,
        local_index: Arc<dyn ILocalIndex>,
        block_size: BlockSize,
    ) -> Self {
        Self {
            meta_store,
            block_store,
            local_filesystem,
            local_index,
            block_size,
        }
    }

    /// Block size used to chunk local files
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    // ========================================================================
    // SyncEngine::sync()
    // ========================================================================

    /// Performs one full sync pass
    ///
    /// # Errors
    /// Any store, filesystem or index failure aborts the pass. The local
    /// index is only rewritten when every step succeeded.
    #[instrument(skip(self), fields(block_size = self.block_size.get()))]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let start = Instant::now();

        let local = self.local_index.load().await.map_err(SyncError::Index)?;
        let remote = self.meta_store.get_file_info_map().await?;
        let scan = scanner::scan(self.local_filesystem.as_ref(), self.block_size).await?;

        info!(
            indexed = local.len(),
            remote = remote.len(),
            scanned = scan.len(),
            "Starting sync pass"
        );

        let mut pass = Pass {
            local,
            scan,
            report: SyncReport::default(),
        };
        pass.local
            .retain(|name, _| self.local_filesystem.is_tracked(name));

        // Steps 1-2
        let changes = classify(&mut pass.local, &pass.scan);
        debug!(
            created = changes.created.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "Local changes classified"
        );

        // Step 3
        let handled = self.reconcile_remote(&mut pass, &remote, &changes).await?;

        // Step 4
        for name in &changes.created {
            if remote.contains_key(name) {
                continue;
            }
            let record = FileMetaData::new(name.clone(), Version::INITIAL, scanned(&pass.scan, name));
            self.settle(&mut pass, record).await?;
        }

        // Step 5
        for name in &changes.created {
            if handled.contains(name) {
                continue;
            }
            if let Some(remote_record) = remote.get(name) {
                self.adopt(&mut pass, remote_record).await?;
            }
        }

        // Step 6
        for name in changes.updated.iter().chain(&changes.deleted) {
            if handled.contains(name) {
                continue;
            }
            let Some(record) = pass.local.get(name).cloned() else {
                continue;
            };
            match remote.get(name) {
                Some(remote_record) if record.is_tombstone() && remote_record.is_tombstone() => {}
                Some(_) => self.settle(&mut pass, record).await?,
                None if record.is_tombstone() => {}
                None => {
                    // Known locally but never reached this store.
                    let record = FileMetaData {
                        version: Version::INITIAL,
                        ..record
                    };
                    self.settle(&mut pass, record).await?;
                }
            }
        }

        // Step 7
        self.local_index
            .replace_all(&pass.local)
            .await
            .map_err(SyncError::Index)?;

        let mut report = pass.report;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            uploaded = report.uploaded,
            downloaded = report.downloaded,
            deleted_local = report.deleted_local,
            deleted_remote = report.deleted_remote,
            conflicts = report.conflicts,
            blocks_uploaded = report.blocks_uploaded,
            duration_ms = report.duration_ms,
            "Sync pass complete"
        );

        Ok(report)
    }

    // ========================================================================
    // Step 3: reconcile the remote snapshot
    // ========================================================================

    /// Returns the files settled here so later steps leave them alone
    async fn reconcile_remote(
        &self,
        pass: &mut Pass,
        remote: &IndexMap,
        changes: &LocalChanges,
    ) -> Result<BTreeSet<FileName>, SyncError> {
        let mut handled = BTreeSet::new();

        for (name, remote_record) in remote {
            if !self.local_filesystem.is_tracked(name) {
                debug!(file = %name, "Skipping reserved name");
                handled.insert(name.clone());
                continue;
            }
            let Some(local_record) = pass.local.get(name).cloned() else {
                if !remote_record.is_tombstone() {
                    self.adopt(pass, remote_record).await?;
                    handled.insert(name.clone());
                } else if !changes.created.contains(name) {
                    // Remembered so a later local recreate revives it.
                    pass.local.insert(name.clone(), remote_record.clone());
                    handled.insert(name.clone());
                }
                continue;
            };

            if remote_record.version > local_record.version {
                debug!(file = %name, local = %local_record.version, remote = %remote_record.version, "Remote is ahead");
                self.adopt(pass, remote_record).await?;
                handled.insert(name.clone());
            } else if remote_record.version.next() == local_record.version {
                debug!(file = %name, version = %local_record.version, "Local is one version ahead");
                self.settle(pass, local_record).await?;
                handled.insert(name.clone());
            }
        }

        Ok(handled)
    }

    // ========================================================================
    // Push and conflict resolution
    // ========================================================================

    /// Pushes `record` and records the outcome in the local index
    ///
    /// A rejected push is resolved by adopting the stored record.
    async fn settle(&self, pass: &mut Pass, record: FileMetaData) -> Result<(), SyncError> {
        if let Some(hashes) = record.block_list.hashes() {
            self.upload_blocks(&record.filename, hashes, &mut pass.report)
                .await?;
        }

        match self.meta_store.update_file(&record).await? {
            UpdateOutcome::Accepted(version) => {
                if record.is_tombstone() {
                    info!(file = %record.filename, %version, "Deletion pushed");
                    pass.report.deleted_remote += 1;
                } else {
                    info!(file = %record.filename, %version, "File pushed");
                    pass.report.uploaded += 1;
                }
                pass.local.insert(
                    record.filename.clone(),
                    FileMetaData { version, ..record },
                );
                Ok(())
            }
            UpdateOutcome::Rejected => self.resolve_conflict(pass, &record.filename).await,
        }
    }

    /// Re-reads the metadata store and adopts its record for `name`
    async fn resolve_conflict(&self, pass: &mut Pass, name: &FileName) -> Result<(), SyncError> {
        pass.report.conflicts += 1;

        let fresh = self.meta_store.get_file_info_map().await?;
        let Some(stored) = fresh.get(name) else {
            return Err(StoreError::Protocol(format!(
                "update of '{name}' was rejected but the store has no record of it"
            ))
            .into());
        };

        warn!(file = %name, version = %stored.version, "Version conflict, adopting stored record");
        self.adopt(pass, stored).await
    }

    /// Makes the local file match `record` and records it in the local index
    async fn adopt(&self, pass: &mut Pass, record: &FileMetaData) -> Result<(), SyncError> {
        let name = &record.filename;
        match record.block_list.hashes() {
            None => {
                if self
                    .local_filesystem
                    .exists(name)
                    .await
                    .map_err(SyncError::Io)?
                {
                    self.local_filesystem
                        .delete_file(name)
                        .await
                        .map_err(SyncError::Io)?;
                    info!(file = %name, version = %record.version, "Deleted local file");
                    pass.report.deleted_local += 1;
                }
            }
            Some(hashes) if pass.scan.get(name).map(Vec::as_slice) == Some(hashes) => {
                debug!(file = %name, "Local content already matches");
            }
            Some(hashes) => {
                self.download(name, hashes).await?;
                info!(file = %name, version = %record.version, "Downloaded file");
                pass.report.downloaded += 1;
            }
        }

        pass.local.insert(name.clone(), record.clone());
        Ok(())
    }

    // ========================================================================
    // Block transfer
    // ========================================================================

    /// Fetches every block of `hashes` in order and writes the file
    #[instrument(skip(self, hashes), fields(file = %name, blocks = hashes.len()))]
    async fn download(&self, name: &FileName, hashes: &[BlockHash]) -> Result<(), SyncError> {
        let mut data = Vec::new();
        for hash in hashes {
            let block = self.block_store.get_block(hash).await?;
            if block.hash() != *hash {
                return Err(SyncError::CorruptBlock {
                    file: name.clone(),
                    hash: hash.to_string(),
                });
            }
            data.extend_from_slice(block.data());
        }

        self.local_filesystem
            .write_file(name, &data)
            .await
            .map_err(SyncError::Io)
    }

    /// Uploads the blocks of `hashes` the block store does not hold yet
    ///
    /// The file is re-read and re-chunked; it must still hash to `hashes`.
    #[instrument(skip(self, hashes, report), fields(file = %name, blocks = hashes.len()))]
    async fn upload_blocks(
        &self,
        name: &FileName,
        hashes: &[BlockHash],
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        if hashes.is_empty() {
            return Ok(());
        }

        let present: HashSet<BlockHash> =
            self.block_store.has_blocks(hashes).await?.into_iter().collect();
        let mut missing: HashSet<&BlockHash> =
            hashes.iter().filter(|h| !present.contains(*h)).collect();

        if missing.is_empty() {
            report.blocks_skipped += hashes.len() as u32;
            return Ok(());
        }

        let data = self
            .local_filesystem
            .read_file(name)
            .await
            .map_err(SyncError::Io)?;
        let changed = || SyncError::ContentChanged { file: name.clone() };

        let ranges: Vec<_> = chunk_ranges(data.len(), self.block_size).collect();
        if ranges.len() != hashes.len() {
            return Err(changed());
        }

        for (range, expected) in ranges.into_iter().zip(hashes) {
            let block = Block::new(data[range].to_vec());
            if block.hash() != *expected {
                return Err(changed());
            }
            if missing.remove(expected) {
                self.block_store.put_block(&block).await?;
                report.blocks_uploaded += 1;
            } else {
                report.blocks_skipped += 1;
            }
        }

        debug!(
            uploaded = report.blocks_uploaded,
            skipped = report.blocks_skipped,
            "Blocks uploaded"
        );
        Ok(())
    }
}

// ============================================================================
// Steps 1-2: classification
// ============================================================================

/// Folds the scan into `local`, returning what changed
///
/// New files are not inserted into `local`; they only get a record once the
/// metadata store has decided their version.
fn classify(local: &mut IndexMap, scan: &LocalScan) -> LocalChanges {
    let mut changes = LocalChanges::default();

    for (name, hashes) in scan {
        match local.get(name) {
            None => {
                changes.created.insert(name.clone());
            }
            Some(previous) if previous.has_content(hashes) => {}
            Some(previous) => {
                let record = FileMetaData::new(name.clone(), previous.version.next(), hashes.clone());
                local.insert(name.clone(), record);
                changes.updated.insert(name.clone());
            }
        }
    }

    for (name, record) in local.iter_mut() {
        if !scan.contains_key(name) && !record.is_tombstone() {
            *record = FileMetaData::tombstone(name.clone(), record.version.next());
            changes.deleted.insert(name.clone());
        }
    }

    changes
}

fn scanned(scan: &LocalScan, name: &FileName) -> Vec<BlockHash> {
    scan.get(name).cloned().unwrap_or_default()
}
