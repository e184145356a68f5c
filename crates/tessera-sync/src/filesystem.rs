//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] over one flat base directory using
//! `tokio::fs`.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: write-to-temp + rename inside the base directory, so
//!   a reader never observes a half-written file.
//! - **Reserved names**: the local index database and its SQLite sidecars
//!   (`index.db`, `index.db-journal`, ...) share a prefix and are never
//!   listed. Leftover temporary files are skipped as well.
//! - **Flat layout**: subdirectories, symlinks to directories and names that
//!   are not valid [`FileName`]s are ignored.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tessera_core::domain::FileName;
use tessera_core::ports::ILocalFileSystem;
use tracing::{debug, instrument, trace};

/// Suffix of in-flight atomic writes
const TEMP_SUFFIX: &str = ".tessera-tmp";

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to a base directory
#[derive(Debug, Clone)]
pub struct LocalFileSystemAdapter {
    base_dir: PathBuf,
    reserved_prefix: String,
}

impl LocalFileSystemAdapter {
    /// Creates an adapter rooted at `base_dir`
    ///
    /// Every name starting with `index_file` is reserved for the local index.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, index_file: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            reserved_prefix: index_file.into(),
        }
    }

    /// Directory being synchronized
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns true if `name` belongs to the adapter or the local index
    pub fn is_reserved(&self, name: &str) -> bool {
        (!self.reserved_prefix.is_empty() && name.starts_with(&self.reserved_prefix))
            || name.ends_with(TEMP_SUFFIX)
    }

    fn path_of(&self, name: &FileName) -> PathBuf {
        self.base_dir.join(name)
    }
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(base_dir = %self.base_dir.display()))]
    async fn list_files(&self) -> anyhow::Result<Vec<FileName>> {
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("base directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(raw) = entry.file_name().into_string() else {
                debug!(path = %entry.path().display(), "skipping non UTF-8 name");
                continue;
            };
            if self.is_reserved(&raw) {
                trace!(name = %raw, "skipping reserved name");
                continue;
            }

            // Follows symlinks, unlike DirEntry::metadata.
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                trace!(name = %raw, "skipping non-regular entry");
                continue;
            }

            match FileName::new(raw) {
                Ok(name) => files.push(name),
                Err(e) => debug!(error = %e, "skipping untrackable name"),
            }
        }

        files.sort();
        debug!(files = files.len(), "base directory listed");
        Ok(files)
    }

    #[instrument(skip(self), fields(file = %name))]
    async fn read_file(&self, name: &FileName) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(self.path_of(name)).await?;
        trace!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(file = %name, bytes = data.len()))]
    async fn write_file(&self, name: &FileName, data: &[u8]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;

        let target = self.path_of(name);
        let tmp_path = self.base_dir.join(format!("{}{}", name, TEMP_SUFFIX));

        tokio::fs::write(&tmp_path, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!("write complete");
        Ok(())
    }

    #[instrument(skip(self), fields(file = %name))]
    async fn delete_file(&self, name: &FileName) -> anyhow::Result<()> {
        match tokio::fs::remove_file(self.path_of(name)).await {
            Ok(()) => {
                debug!("file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &FileName) -> anyhow::Result<bool> {
        Ok(tokio::fs::try_exists(self.path_of(name)).await?)
    }

    fn is_tracked(&self, name: &FileName) -> bool {
        !self.is_reserved(name.as_str())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
