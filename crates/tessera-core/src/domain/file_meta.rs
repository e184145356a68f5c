//! File metadata records and the version acceptance rule
//!
//! A [`FileMetaData`] record is never physically removed: deletion is the
//! [`BlockList::Deleted`] state (a tombstone) that keeps the version lineage.
//! On the wire and on disk a tombstone is the single-element hash list
//! `["0"]`; in memory it is a distinct variant so it cannot be confused with
//! real content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{BlockHash, FileName, Version};

/// Reserved hash-list entry that encodes a tombstone outside the process
pub const TOMBSTONE_HASH: &str = "0";

/// Mapping filename -> metadata, ordered by filename
pub type IndexMap = BTreeMap<FileName, FileMetaData>;

// ============================================================================
// BlockList
// ============================================================================

/// Content of a file record: its ordered block hashes, or deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum BlockList {
    /// The file exists with these blocks, in order
    Present(Vec<BlockHash>),
    /// The file was deleted (tombstone)
    Deleted,
}

impl BlockList {
    /// Returns true for a tombstone
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, BlockList::Deleted)
    }

    /// Block hashes of a present file, `None` for a tombstone
    #[must_use]
    pub fn hashes(&self) -> Option<&[BlockHash]> {
        match self {
            BlockList::Present(hashes) => Some(hashes),
            BlockList::Deleted => None,
        }
    }

    /// Decode the external hash-list representation
    ///
    /// # Errors
    /// Returns error if any entry other than a lone sentinel is not a valid hash
    pub fn from_wire(list: Vec<String>) -> Result<Self, DomainError> {
        if list.len() == 1 && list[0] == TOMBSTONE_HASH {
            return Ok(BlockList::Deleted);
        }
        list.into_iter()
            .map(BlockHash::new)
            .collect::<Result<Vec<_>, _>>()
            .map(BlockList::Present)
    }

    /// Encode to the external hash-list representation
    #[must_use]
    pub fn to_wire(&self) -> Vec<String> {
        match self {
            BlockList::Present(hashes) => hashes.iter().map(|h| h.as_str().to_string()).collect(),
            BlockList::Deleted => vec![TOMBSTONE_HASH.to_string()],
        }
    }
}

impl TryFrom<Vec<String>> for BlockList {
    type Error = DomainError;

    fn try_from(list: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_wire(list)
    }
}

impl From<BlockList> for Vec<String> {
    fn from(list: BlockList) -> Self {
        list.to_wire()
    }
}

// ============================================================================
// FileMetaData
// ============================================================================

/// Versioned metadata record of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetaData {
    /// Unique key
    pub filename: FileName,
    /// Record version, starting at 1
    pub version: Version,
    /// Ordered block hashes, or tombstone
    #[serde(rename = "block_hash_list")]
    pub block_list: BlockList,
}

impl FileMetaData {
    /// Record for a file with content
    #[must_use]
    pub fn new(filename: FileName, version: Version, hashes: Vec<BlockHash>) -> Self {
        Self {
            filename,
            version,
            block_list: BlockList::Present(hashes),
        }
    }

    /// Tombstone record
    #[must_use]
    pub fn tombstone(filename: FileName, version: Version) -> Self {
        Self {
            filename,
            version,
            block_list: BlockList::Deleted,
        }
    }

    /// Returns true if this record marks the file deleted
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.block_list.is_deleted()
    }

    /// Returns true if this record holds exactly `hashes` as content
    #[must_use]
    pub fn has_content(&self, hashes: &[BlockHash]) -> bool {
        self.block_list.hashes() == Some(hashes)
    }
}

// ============================================================================
// UpdateOutcome and the compare-and-swap rule
// ============================================================================

/// Result of an `UpdateFile` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was stored at this version
    Accepted(Version),
    /// The candidate version did not follow the stored one
    Rejected,
}

impl UpdateOutcome {
    /// Wire value used to signal rejection
    pub const REJECTED_WIRE: i64 = -1;

    /// Encode as the wire integer (`-1` for rejection)
    #[must_use]
    pub fn to_wire(self) -> i64 {
        match self {
            UpdateOutcome::Accepted(v) => v.into(),
            UpdateOutcome::Rejected => Self::REJECTED_WIRE,
        }
    }

    /// Decode the wire integer
    ///
    /// # Errors
    /// Returns error for values that are neither `-1` nor a valid version
    pub fn from_wire(v: i64) -> Result<Self, DomainError> {
        if v == Self::REJECTED_WIRE {
            return Ok(UpdateOutcome::Rejected);
        }
        Version::try_from(v).map(UpdateOutcome::Accepted)
    }

    /// Accepted version, if any
    #[must_use]
    pub fn accepted(self) -> Option<Version> {
        match self {
            UpdateOutcome::Accepted(v) => Some(v),
            UpdateOutcome::Rejected => None,
        }
    }
}

/// Decide how the Metadata Store answers `UpdateFile(candidate)`
///
/// Returns the record to store together with the outcome. Rules:
/// - unknown file: accept only version 1
/// - current record is a tombstone: always accept, stored version forced to
///   `current + 1`
/// - otherwise: accept only `current + 1`
#[must_use]
pub fn resolve_update(
    current: Option<&FileMetaData>,
    candidate: &FileMetaData,
) -> (UpdateOutcome, Option<FileMetaData>) {
    match current {
        None if candidate.version == Version::INITIAL => (
            UpdateOutcome::Accepted(Version::INITIAL),
            Some(candidate.clone()),
        ),
        None => (UpdateOutcome::Rejected, None),
        Some(existing) if existing.is_tombstone() => {
            let version = existing.version.next();
            let stored = FileMetaData {
                version,
                ..candidate.clone()
            };
            (UpdateOutcome::Accepted(version), Some(stored))
        }
        Some(existing) if candidate.version == existing.version.next() => (
            UpdateOutcome::Accepted(candidate.version),
            Some(candidate.clone()),
        ),
        Some(_) => (UpdateOutcome::Rejected, None),
    }
}
