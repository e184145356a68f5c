//! Local filesystem port (driven/secondary port)
//!
//! Synchronization is flat: the adapter exposes the regular files directly
//! inside one base directory, addressed by [`FileName`].
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - `write_file` must replace content atomically so a concurrent reader
//!   never observes a partially written file.

use crate::domain::FileName;

/// Port trait for local filesystem operations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Lists the tracked regular files of the base directory
    ///
    /// Directories, reserved names and entries that are not valid
    /// [`FileName`]s are skipped.
    async fn list_files(&self) -> anyhow::Result<Vec<FileName>>;

    /// Reads the entire contents of a file
    async fn read_file(&self, name: &FileName) -> anyhow::Result<Vec<u8>>;

    /// Writes a file, replacing any previous content
    async fn write_file(&self, name: &FileName, data: &[u8]) -> anyhow::Result<()>;

    /// Deletes a file; deleting a missing file is not an error
    async fn delete_file(&self, name: &FileName) -> anyhow::Result<()>;

    /// Returns true if the file exists
    async fn exists(&self, name: &FileName) -> anyhow::Result<bool>;

    /// Returns false for names the adapter keeps for itself
    ///
    /// Untracked names are never listed, and a remote record carrying one
    /// must not be written into the base directory.
    fn is_tracked(&self, name: &FileName) -> bool;
}
