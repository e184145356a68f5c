//! Integration tests for SyncEngine
//!
//! Each client syncs a temporary base directory against in-process stores
//! and keeps its local index in a SQLite file inside that directory, the way
//! the CLI lays it out.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tessera_cache::{DatabasePool, SqliteLocalIndex};
use tessera_core::domain::{
    chunk_ranges, hash_blocks, Block, BlockHash, BlockSize, FileMetaData, FileName, IndexMap, StoreError,
    UpdateOutcome, Version,
};
use tessera_core::ports::{IBlockStore, ILocalFileSystem, ILocalIndex, IMetaStore};
use tessera_store::{BlockStore, Leadership, MetaStore};
use tessera_sync::{LocalFileSystemAdapter, SyncEngine, SyncError, SyncReport};

const INDEX_FILE: &str = "index.db";
const BLOCK: usize = 4;

// ============================================================================
// Test helpers
// ============================================================================

fn name(s: &str) -> FileName {
    s.parse().unwrap()
}

fn v(n: u32) -> Version {
    Version::new(n).unwrap()
}

fn hashes(data: &[u8]) -> Vec<BlockHash> {
    hash_blocks(data, BlockSize::new(BLOCK).unwrap())
}

/// Stores shared by every client of a test
struct Cluster {
    meta: Arc<MetaStore>,
    blocks: Arc<BlockStore>,
}

impl Cluster {
    fn new() -> Self {
        Self {
            meta: Arc::new(MetaStore::new("local")),
            blocks: Arc::new(BlockStore::new()),
        }
    }

    async fn remote(&self) -> IndexMap {
        self.meta.get_file_info_map().await.unwrap()
    }

    /// Publishes `data` as version 1 of `file` without going through a client
    async fn publish(&self, file: &str, data: &[u8]) {
        for range in chunk_ranges(data.len(), BlockSize::new(BLOCK).unwrap()) {
            self.blocks.put_block(&Block::new(data[range].to_vec())).await.unwrap();
        }
        let record = FileMetaData::new(name(file), v(1), hashes(data));
        assert_eq!(
            self.meta.update_file(&record).await.unwrap(),
            UpdateOutcome::Accepted(v(1))
        );
    }
}

/// One client: a base directory, its local index and an engine
struct Client {
    dir: TempDir,
    index: Arc<SqliteLocalIndex>,
    engine: SyncEngine,
}

impl Client {
    async fn new(cluster: &Cluster) -> Self {
        Self::with_meta(cluster, cluster.meta.clone()).await
    }

    async fn with_meta(cluster: &Cluster, meta: Arc<dyn IMetaStore>) -> Self {
        let dir = TempDir::new().unwrap();
        let fs = Arc::new(LocalFileSystemAdapter::new(dir.path(), INDEX_FILE));
        Self::build(dir, meta, cluster.blocks.clone(), fs).await
    }

    async fn build(
        dir: TempDir,
        meta: Arc<dyn IMetaStore>,
        blocks: Arc<dyn IBlockStore>,
        fs: Arc<dyn ILocalFileSystem>,
    ) -> Self {
        let pool = DatabasePool::new(&dir.path().join(INDEX_FILE)).await.unwrap();
        let index = Arc::new(SqliteLocalIndex::new(pool.pool().clone()));
        let engine = SyncEngine::new(
            meta,
            blocks,
            fs,
            index.clone(),
            BlockSize::new(BLOCK).unwrap(),
        );
        Self { dir, index, engine }
    }

    fn write(&self, file: &str, data: &[u8]) {
        std::fs::write(self.dir.path().join(file), data).unwrap();
    }

    fn read(&self, file: &str) -> Option<Vec<u8>> {
        std::fs::read(self.dir.path().join(file)).ok()
    }

    fn remove(&self, file: &str) {
        std::fs::remove_file(self.dir.path().join(file)).unwrap();
    }

    async fn sync(&self) -> SyncReport {
        self.engine.sync().await.unwrap()
    }

    async fn indexed(&self) -> IndexMap {
        self.index.load().await.unwrap()
    }
}

/// Metadata store wrapper that counts updates and can serve one stale
/// (empty) snapshot, simulating a writer that raced this client
struct ProbeMeta {
    inner: Arc<MetaStore>,
    stale_first: AtomicBool,
    updates: AtomicUsize,
}

impl ProbeMeta {
    fn new(inner: Arc<MetaStore>, stale_first: bool) -> Self {
        Self {
            inner,
            stale_first: AtomicBool::new(stale_first),
            updates: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl IMetaStore for ProbeMeta {
    async fn get_file_info_map(&self) -> Result<IndexMap, StoreError> {
        if self.stale_first.swap(false, Ordering::SeqCst) {
            return Ok(IndexMap::new());
        }
        self.inner.get_file_info_map().await
    }

    async fn update_file(&self, meta: &FileMetaData) -> Result<UpdateOutcome, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_file(meta).await
    }

    async fn get_block_store_addr(&self) -> Result<String, StoreError> {
        self.inner.get_block_store_addr().await
    }
}

/// Filesystem wrapper whose files change after the first read
struct ShiftingFs {
    inner: LocalFileSystemAdapter,
    reads: AtomicUsize,
}

#[async_trait::async_trait]
impl ILocalFileSystem for ShiftingFs {
    async fn list_files(&self) -> anyhow::Result<Vec<FileName>> {
        self.inner.list_files().await
    }

    async fn read_file(&self, name: &FileName) -> anyhow::Result<Vec<u8>> {
        let mut data = self.inner.read_file(name).await?;
        if self.reads.fetch_add(1, Ordering::SeqCst) > 0 {
            data.reverse();
        }
        Ok(data)
    }

    async fn write_file(&self, name: &FileName, data: &[u8]) -> anyhow::Result<()> {
        self.inner.write_file(name, data).await
    }

    async fn delete_file(&self, name: &FileName) -> anyhow::Result<()> {
        self.inner.delete_file(name).await
    }

    async fn exists(&self, name: &FileName) -> anyhow::Result<bool> {
        self.inner.exists(name).await
    }

    fn is_tracked(&self, name: &FileName) -> bool {
        self.inner.is_tracked(name)
    }
}

// ============================================================================
// Single client
// ============================================================================

#[tokio::test]
async fn test_first_sync_uploads_new_file() {
    let cluster = Cluster::new();
    let client = Client::new(&cluster).await;
    client.write("a.txt", b"hello world");

    let report = client.sync().await;

    assert_eq!(report.uploaded, 1);
    assert_eq!(report.blocks_uploaded, 3);
    let remote = cluster.remote().await;
    assert_eq!(
        remote[&name("a.txt")],
        FileMetaData::new(name("a.txt"), v(1), hashes(b"hello world"))
    );
    assert_eq!(cluster.blocks.len().await, 3);
    assert_eq!(client.indexed().await, remote);
}

#[tokio::test]
async fn test_index_file_is_never_synced() {
    let cluster = Cluster::new();
    let client = Client::new(&cluster).await;
    client.write("a.txt", b"x");

    client.sync().await;

    let remote = cluster.remote().await;
    assert_eq!(remote.keys().cloned().collect::<Vec<_>>(), vec![name("a.txt")]);
}

#[tokio::test]
async fn test_second_pass_without_changes_is_idempotent() {
    let cluster = Cluster::new();
    let probe = Arc::new(ProbeMeta::new(cluster.meta.clone(), false));
    let client = Client::with_meta(&cluster, probe.clone()).await;
    client.write("a.txt", b"some content");
    client.write("b.txt", b"more");

    client.sync().await;
    let index_after_first = client.indexed().await;
    let updates_after_first = probe.updates.load(Ordering::SeqCst);

    let report = client.sync().await;

    assert!(report.is_noop(), "{report:?}");
    assert_eq!(report.blocks_uploaded, 0);
    assert_eq!(probe.updates.load(Ordering::SeqCst), updates_after_first);
    assert_eq!(client.indexed().await, index_after_first);
}

#[tokio::test]
async fn test_identical_blocks_are_stored_once() {
    let cluster = Cluster::new();
    let client = Client::new(&cluster).await;
    client.write("a.txt", b"AAAABBBB");
    client.write("b.txt", b"AAAABBBB");
    client.write("c.txt", b"BBBBCC");

    let report = client.sync().await;

    assert_eq!(report.uploaded, 3);
    // AAAA, BBBB, CC
    assert_eq!(cluster.blocks.len().await, 3);
    assert_eq!(report.blocks_uploaded, 3);
    assert_eq!(report.blocks_skipped, 3);
}

#[tokio::test]
async fn test_update_uploads_only_changed_blocks() {
    let cluster = Cluster::new();
    let client = Client::new(&cluster).await;
    client.write("a.txt", b"0000111122");
    client.sync().await;

    client.write("a.txt", b"0000111133");
    let report = client.sync().await;

    assert_eq!(report.uploaded, 1);
    assert_eq!(report.blocks_uploaded, 1);
    assert_eq!(report.blocks_skipped, 2);
    let remote = cluster.remote().await;
    assert_eq!(remote[&name("a.txt")].version, v(2));
    assert!(remote[&name("a.txt")].has_content(&hashes(b"0000111133")));
}

#[tokio::test]
async fn test_delete_then_recreate_revives_at_version_three() {
    let cluster = Cluster::new();
    let client = Client::new(&cluster).await;

    client.write("a.txt", b"first life");
    client.sync().await;
    assert_eq!(cluster.remote().await[&name("a.txt")].version, v(1));
    let blocks_before_delete = cluster.blocks.len().await;

    client.remove("a.txt");
    let report = client.sync().await;
    assert_eq!(report.deleted_remote, 1);
    assert_eq!(
        cluster.remote().await[&name("a.txt")],
        FileMetaData::tombstone(name("a.txt"), v(2))
    );
    assert_eq!(cluster.blocks.len().await, blocks_before_delete);

    client.write("a.txt", b"second life");
    let report = client.sync().await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(
        cluster.remote().await[&name("a.txt")],
        FileMetaData::new(name("a.txt"), v(3), hashes(b"second life"))
    );
}

#[tokio::test]
async fn test_empty_file_is_synced_and_remembered() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    a.write("empty", b"");

    let report = a.sync().await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.blocks_uploaded, 0);
    assert_eq!(
        a.indexed().await[&name("empty")],
        FileMetaData::new(name("empty"), v(1), Vec::new())
    );
    assert!(a.sync().await.is_noop());

    let b = Client::new(&cluster).await;
    let report = b.sync().await;
    assert_eq!(report.downloaded, 1);
    assert_eq!(b.read("empty"), Some(Vec::new()));
}

#[tokio::test]
async fn test_file_changed_during_upload_aborts_pass() {
    let cluster = Cluster::new();
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(ShiftingFs {
        inner: LocalFileSystemAdapter::new(dir.path(), INDEX_FILE),
        reads: AtomicUsize::new(0),
    });
    let client = Client::build(dir, cluster.meta.clone(), cluster.blocks.clone(), fs).await;
    client.write("a.txt", b"abcdefgh");

    let err = client.engine.sync().await.unwrap_err();

    assert!(
        matches!(err, SyncError::ContentChanged { ref file } if *file == name("a.txt")),
        "{err:?}"
    );
    assert!(cluster.remote().await.is_empty());
    assert!(client.indexed().await.is_empty());
}

// ============================================================================
// Several clients
// ============================================================================

#[tokio::test]
async fn test_second_client_downloads_remote_files() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    a.write("a.txt", b"shared content");
    a.write("b.txt", b"tiny");
    a.sync().await;

    let b = Client::new(&cluster).await;
    let report = b.sync().await;

    assert_eq!(report.downloaded, 2);
    assert_eq!(b.read("a.txt").unwrap(), b"shared content");
    assert_eq!(b.read("b.txt").unwrap(), b"tiny");
    assert_eq!(b.indexed().await, cluster.remote().await);
}

#[tokio::test]
async fn test_remote_update_overwrites_local_copy() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    let b = Client::new(&cluster).await;
    a.write("a.txt", b"version one");
    a.sync().await;
    b.sync().await;

    a.write("a.txt", b"version two");
    a.sync().await;
    let report = b.sync().await;

    assert_eq!(report.downloaded, 1);
    assert_eq!(b.read("a.txt").unwrap(), b"version two");
    assert_eq!(b.indexed().await[&name("a.txt")].version, v(2));
}

#[tokio::test]
async fn test_remote_deletion_removes_local_file() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    let b = Client::new(&cluster).await;
    a.write("a.txt", b"doomed");
    a.sync().await;
    b.sync().await;
    assert!(b.read("a.txt").is_some());

    a.remove("a.txt");
    a.sync().await;
    let report = b.sync().await;

    assert_eq!(report.deleted_local, 1);
    assert!(b.read("a.txt").is_none());
    assert_eq!(
        b.indexed().await[&name("a.txt")],
        FileMetaData::tombstone(name("a.txt"), v(2))
    );
}

#[tokio::test]
async fn test_concurrent_create_loser_adopts_winner() {
    let cluster = Cluster::new();
    let winner = Client::new(&cluster).await;
    winner.write("a.txt", b"alpha content");
    winner.sync().await;

    // The loser's pass starts from a snapshot taken before the winner pushed.
    let stale = Arc::new(ProbeMeta::new(cluster.meta.clone(), true));
    let loser = Client::with_meta(&cluster, stale).await;
    loser.write("a.txt", b"beta");

    let report = loser.sync().await;

    assert_eq!(report.conflicts, 1);
    assert_eq!(report.uploaded, 0);
    assert_eq!(loser.read("a.txt").unwrap(), b"alpha content");
    let remote = cluster.remote().await;
    assert_eq!(
        remote[&name("a.txt")],
        FileMetaData::new(name("a.txt"), v(1), hashes(b"alpha content"))
    );
    assert_eq!(loser.indexed().await, remote);
}

#[tokio::test]
async fn test_concurrent_update_loser_adopts_winner() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    let b = Client::new(&cluster).await;
    a.write("a.txt", b"base");
    a.sync().await;
    b.sync().await;

    a.write("a.txt", b"edited by a");
    b.write("a.txt", b"edited by b");
    a.sync().await;
    let report = b.sync().await;

    assert_eq!(report.conflicts, 1);
    assert_eq!(b.read("a.txt").unwrap(), b"edited by a");
    assert_eq!(b.indexed().await[&name("a.txt")].version, v(2));
    assert!(b.sync().await.is_noop());
}

#[tokio::test]
async fn test_local_delete_racing_remote_update_restores_file() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    let b = Client::new(&cluster).await;
    a.write("a.txt", b"base");
    a.sync().await;
    b.sync().await;

    a.write("a.txt", b"kept by a");
    a.sync().await;
    b.remove("a.txt");
    let report = b.sync().await;

    assert_eq!(report.conflicts, 1);
    assert_eq!(b.read("a.txt").unwrap(), b"kept by a");
    assert!(!cluster.remote().await[&name("a.txt")].is_tombstone());
}

#[tokio::test]
async fn test_remote_tombstone_is_remembered_for_later_revive() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    a.write("a.txt", b"short lived");
    a.sync().await;
    a.remove("a.txt");
    a.sync().await;

    let b = Client::new(&cluster).await;
    let report = b.sync().await;
    assert!(report.is_noop());
    assert!(b.read("a.txt").is_none());
    assert_eq!(
        b.indexed().await[&name("a.txt")],
        FileMetaData::tombstone(name("a.txt"), v(2))
    );

    b.write("a.txt", b"back again");
    let report = b.sync().await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(cluster.remote().await[&name("a.txt")].version, v(3));
}

#[tokio::test]
async fn test_new_local_file_over_remote_tombstone_is_deleted() {
    let cluster = Cluster::new();
    let a = Client::new(&cluster).await;
    a.write("a.txt", b"gone soon");
    a.sync().await;
    a.remove("a.txt");
    a.sync().await;

    let b = Client::new(&cluster).await;
    b.write("a.txt", b"unsynced local");
    let report = b.sync().await;

    assert_eq!(report.deleted_local, 1);
    assert!(b.read("a.txt").is_none());
    assert!(b.indexed().await[&name("a.txt")].is_tombstone());
}

// ============================================================================
// Reserved names
// ============================================================================

#[tokio::test]
async fn test_remote_records_with_reserved_names_are_left_alone() {
    let cluster = Cluster::new();
    cluster.publish("notes.tessera-tmp", b"half written").await;
    cluster.publish("index.db.bak", b"old index").await;

    let client = Client::new(&cluster).await;
    client.write("a.txt", b"tracked");
    let first = client.sync().await;
    let second = client.sync().await;

    assert_eq!(first.downloaded, 0);
    assert_eq!(first.uploaded, 1);
    assert!(second.is_noop());
    assert!(client.read("notes.tessera-tmp").is_none());
    assert!(client.read("index.db.bak").is_none());

    let indexed = client.indexed().await;
    assert_eq!(indexed.keys().cloned().collect::<Vec<_>>(), vec![name("a.txt")]);

    let remote = cluster.remote().await;
    for file in ["notes.tessera-tmp", "index.db.bak"] {
        let record = &remote[&name(file)];
        assert_eq!(record.version, v(1), "{file}");
        assert!(!record.is_tombstone(), "{file}");
    }
}

#[tokio::test]
async fn test_remote_record_named_like_the_index_does_not_overwrite_it() {
    let cluster = Cluster::new();
    cluster.publish("index.db", b"not a database").await;

    let client = Client::new(&cluster).await;
    client.write("a.txt", b"tracked");
    let report = client.sync().await;
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.uploaded, 1);

    client.write("b.txt", b"second pass");
    let report = client.sync().await;
    assert_eq!(report.uploaded, 1);

    let indexed = client.indexed().await;
    assert!(!indexed.contains_key(&name("index.db")));
    assert_eq!(indexed.len(), 2);
    assert!(!cluster.remote().await[&name("index.db")].is_tombstone());
}

// ============================================================================
// Aborted passes
// ============================================================================

#[tokio::test]
async fn test_missing_block_aborts_without_rewriting_index() {
    let cluster = Cluster::new();
    let dangling = FileMetaData::new(name("a.txt"), v(1), vec![BlockHash::of(b"nowhere")]);
    cluster.meta.update_file(&dangling).await.unwrap();

    let client = Client::new(&cluster).await;
    let err = client.engine.sync().await.unwrap_err();

    assert!(
        matches!(err, SyncError::Store(StoreError::NotFound(ref h)) if *h == BlockHash::of(b"nowhere")),
        "{err:?}"
    );
    assert!(client.read("a.txt").is_none());
    assert!(client.indexed().await.is_empty());
}

#[tokio::test]
async fn test_follower_metadata_store_aborts_pass() {
    let cluster = Cluster::new();
    let follower = Arc::new(MetaStore::with_leadership("local", Leadership::follower()));
    let client = Client::with_meta(&cluster, follower).await;
    client.write("a.txt", b"x");

    let err = client.engine.sync().await.unwrap_err();

    assert!(
        matches!(err, SyncError::Store(StoreError::NotLeader { .. })),
        "{err:?}"
    );
    assert!(client.indexed().await.is_empty());
}

#[tokio::test]
async fn test_aborted_pass_is_retried_wholesale() {
    let cluster = Cluster::new();
    let leadership = Leadership::follower();
    let meta = Arc::new(MetaStore::with_leadership("local", leadership.clone()));
    let client = Client::with_meta(&cluster, meta.clone()).await;
    client.write("a.txt", b"retry me");

    assert!(client.engine.sync().await.is_err());

    leadership.set_leader(true);
    let report = client.sync().await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(
        meta.get_file_info_map().await.unwrap()[&name("a.txt")].version,
        v(1)
    );
}
