//! Selected block header info.
//!
//! [`BlockInfo`] keeps the four header fields callers use to follow the
//! chain: number, hash, parent hash and timestamp. It is decoded straight
//! from an `eth_getBlockByNumber` result.

use alloy::primitives::{B256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{ProviderError, ProviderResult};
use crate::rpc::RpcHandle;

/// Selected block header info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block hash
    pub hash: B256,

    /// Block number
    pub number: u64,

    /// Parent block hash
    pub parent_hash: B256,

    /// Block timestamp (Unix epoch seconds)
    pub timestamp: u64,
}

/// Header fields as returned over JSON-RPC; pending blocks omit some.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeader {
    number: Option<U64>,
    hash: Option<B256>,
    parent_hash: B256,
    timestamp: U64,
}

impl BlockInfo {
    /// Create a `BlockInfo` manually.
    #[must_use]
    pub const fn new(hash: B256, number: u64, parent_hash: B256, timestamp: u64) -> Self {
        Self {
            hash,
            number,
            parent_hash,
            timestamp,
        }
    }

    /// Decode a block object returned by `eth_getBlockBy*`.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::BlockNotIncluded`] if the block has no number or
    ///   no hash (a pending block).
    /// - [`ProviderError::Decoding`] if the object is not a block header.
    pub fn from_block_json(block: &Value) -> ProviderResult<Self> {
        let raw = RawHeader::deserialize(block)
            .map_err(|e| ProviderError::decoding("invalid block header", Some(Box::new(e))))?;

        let (Some(number), Some(hash)) = (raw.number, raw.hash) else {
            return Err(ProviderError::block_not_included("pending"));
        };

        Ok(Self {
            hash,
            number: number.to::<u64>(),
            parent_hash: raw.parent_hash,
            timestamp: raw.timestamp.to::<u64>(),
        })
    }

    /// Whether `self` directly extends `parent`.
    #[must_use]
    pub fn is_child_of(&self, parent: &Self) -> bool {
        self.parent_hash == parent.hash && parent.number.checked_add(1) == Some(self.number)
    }
}

/// Fetch header info of the block identified by `tag`.
///
/// `tag` is a block tag (`latest`, `finalized`, `safe`, `pending`) or a hex
/// block number.
///
/// # Errors
///
/// - [`ProviderError::BlockNotIncluded`] if the node has no such block or
///   the block is still pending.
/// - Any transport error of the request.
#[instrument(skip(handle))]
pub async fn fetch_block_info(handle: &RpcHandle, tag: &str) -> ProviderResult<BlockInfo> {
    let block = handle
        .request("eth_getBlockByNumber", json!([tag, false]))
        .await?;

    if block.is_null() {
        return Err(ProviderError::block_not_included(tag));
    }

    let info = BlockInfo::from_block_json(&block).map_err(|e| match e {
        ProviderError::BlockNotIncluded { .. } => ProviderError::block_not_included(tag),
        other => other,
    })?;
    debug!(number = info.number, hash = %info.hash, "Block info fetched");
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    const HASH: B256 = b256!("88e96d4537bea4d9c05d12549907b32561d3bf31f45aae734cdc119f13406cb6");
    const PARENT: B256 = b256!("d4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3");

    #[test]
    fn test_from_block_json() {
        let block = json!({
            "number": "0x1",
            "hash": HASH,
            "parentHash": PARENT,
            "timestamp": "0x55ba4224",
            "transactions": []
        });

        let info = BlockInfo::from_block_json(&block);
        assert_eq!(
            info.ok(),
            Some(BlockInfo::new(HASH, 1, PARENT, 0x55ba_4224))
        );
    }

    #[test]
    fn test_pending_block_is_not_included() {
        let block = json!({
            "number": null,
            "hash": null,
            "parentHash": PARENT,
            "timestamp": "0x55ba4224"
        });

        assert!(matches!(
            BlockInfo::from_block_json(&block),
            Err(ProviderError::BlockNotIncluded { .. })
        ));
    }

    #[test]
    fn test_malformed_header() {
        let block = json!({"number": "0x1"});
        assert!(matches!(
            BlockInfo::from_block_json(&block),
            Err(ProviderError::Decoding { .. })
        ));
    }

    #[test]
    fn test_is_child_of() {
        let parent = BlockInfo::new(PARENT, 0, B256::ZERO, 0);
        let child = BlockInfo::new(HASH, 1, PARENT, 12);
        assert!(child.is_child_of(&parent));
        assert!(!parent.is_child_of(&child));
    }

    #[test]
    fn test_is_child_of_at_max_height() {
        let tip = BlockInfo::new(PARENT, u64::MAX, B256::ZERO, 0);
        let other = BlockInfo::new(HASH, 0, PARENT, 12);
        assert!(!other.is_child_of(&tip));
    }
}
