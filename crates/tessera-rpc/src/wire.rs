//! Request and response bodies of the store HTTP API
//!
//! | Method | Path                     | Request              | Response            |
//! |--------|--------------------------|----------------------|---------------------|
//! | POST   | `/block/get`             | [`GetBlockRequest`]  | [`BlockBody`]       |
//! | POST   | `/block/put`             | [`BlockBody`]        | [`PutBlockResponse`]|
//! | POST   | `/block/has`             | [`HashesBody`]       | [`HashesBody`]      |
//! | POST   | `/meta/file-info-map`    | `{}`                 | [`FileInfoMapResponse`] |
//! | POST   | `/meta/update-file`      | `FileMetaData`       | [`UpdateFileResponse`]  |
//! | POST   | `/meta/block-store-addr` | `{}`                 | [`BlockStoreAddrResponse`] |
//!
//! Failures carry an [`ErrorBody`]. A metadata replica that is not the leader
//! answers `503` with `{"error":"not_leader"}`.

use serde::{Deserialize, Serialize};
use tessera_core::domain::{Block, BlockHash, DomainError, IndexMap};

pub const PATH_GET_BLOCK: &str = "/block/get";
pub const PATH_PUT_BLOCK: &str = "/block/put";
pub const PATH_HAS_BLOCKS: &str = "/block/has";
pub const PATH_FILE_INFO_MAP: &str = "/meta/file-info-map";
pub const PATH_UPDATE_FILE: &str = "/meta/update-file";
pub const PATH_BLOCK_STORE_ADDR: &str = "/meta/block-store-addr";

/// `error` code of the leader-redirect reply
pub const ERROR_NOT_LEADER: &str = "not_leader";
/// `error` code of a missing block
pub const ERROR_NOT_FOUND: &str = "not_found";
/// `error` code of a malformed request
pub const ERROR_BAD_REQUEST: &str = "bad_request";
/// `error` code of a request body over the server's limit
pub const ERROR_TOO_LARGE: &str = "too_large";
/// `error` code of an unexpected server failure
pub const ERROR_INTERNAL: &str = "internal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlockRequest {
    pub hash: BlockHash,
}

/// A block on the wire: base64 payload plus its declared size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBody {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub size: usize,
}

impl From<&Block> for BlockBody {
    fn from(block: &Block) -> Self {
        Self {
            data: block.data().to_vec(),
            size: block.size(),
        }
    }
}

impl TryFrom<BlockBody> for Block {
    type Error = DomainError;

    fn try_from(body: BlockBody) -> Result<Self, Self::Error> {
        Block::from_parts(body.data, body.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutBlockResponse {
    pub flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashesBody {
    pub hashes: Vec<BlockHash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfoMapResponse {
    pub file_info_map: IndexMap,
}

/// Accepted version, or `-1` when the update was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFileResponse {
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStoreAddrResponse {
    pub addr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
