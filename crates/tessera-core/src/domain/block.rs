//! Blocks and the fixed-size chunking rule
//!
//! A file of length `L` with block size `S` splits into `L / S` full blocks
//! followed by one block of `L % S` bytes when that remainder is non-zero.
//! An empty file has no blocks. This rule is shared by every client and must
//! stay bit-exact for indices to remain interoperable.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::BlockHash;

/// Validated block size in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct BlockSize(usize);

impl BlockSize {
    /// Create a BlockSize
    ///
    /// # Errors
    /// Returns error if `size` is zero
    pub fn new(size: usize) -> Result<Self, DomainError> {
        if size == 0 {
            return Err(DomainError::InvalidBlockSize(size));
        }
        Ok(Self(size))
    }

    /// Get the size in bytes
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for BlockSize {
    type Error = DomainError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<BlockSize> for usize {
    fn from(size: BlockSize) -> Self {
        size.0
    }
}

/// A chunk of file content as stored by the Block Store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
}

impl Block {
    /// Wrap raw bytes as a block
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Rebuild a block received with an explicit size field
    ///
    /// # Errors
    /// Returns error if `size` disagrees with the payload length
    pub fn from_parts(data: Vec<u8>, size: usize) -> Result<Self, DomainError> {
        if data.len() != size {
            return Err(DomainError::BlockSizeMismatch {
                declared: size,
                actual: data.len(),
            });
        }
        Ok(Self { data })
    }

    /// Content identifier derived from the block bytes
    #[must_use]
    pub fn hash(&self) -> BlockHash {
        BlockHash::of(&self.data)
    }

    /// Block bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Block length in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Consume the block, returning its bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Byte ranges of each block of a `len`-byte file, in order
pub fn chunk_ranges(len: usize, block_size: BlockSize) -> impl Iterator<Item = Range<usize>> {
    let size = block_size.get();
    (0..len)
        .step_by(size)
        .map(move |start| start..(start + size).min(len))
}

/// Content identifiers of every block of `data`, in order
#[must_use]
pub fn hash_blocks(data: &[u8], block_size: BlockSize) -> Vec<BlockHash> {
    chunk_ranges(data.len(), block_size)
        .map(|range| BlockHash::of(&data[range]))
        .collect()
}
