//! Typed wrappers for the `eth_*` methods chainfacts needs.

use alloy_primitives::{Address, Bytes, U64};
use chainfacts_types::BlockReference;
use serde::Deserialize;
use serde_json::json;

use crate::client::JsonRpcClient;
use crate::error::RpcError;

/// The block fields chainfacts reads from `eth_getBlockByNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BlockHeader {
    /// Block number.
    pub number: U64,
    /// Block timestamp (Unix seconds).
    pub timestamp: U64,
}

impl BlockHeader {
    /// Block number as an integer.
    pub fn number(&self) -> u64 {
        self.number.to::<u64>()
    }

    /// Block timestamp as an integer.
    pub fn timestamp(&self) -> u64 {
        self.timestamp.to::<u64>()
    }
}

impl JsonRpcClient {
    /// `eth_blockNumber`: the latest block number.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] if the call fails.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let number: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    /// Batched `eth_getBlockByNumber` without transactions.
    ///
    /// The result is parallel to `blocks`; blocks the node does not have
    /// (not yet produced, pruned) are `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] if any call in the batch fails.
    pub async fn block_headers(
        &self,
        blocks: &[BlockReference],
    ) -> Result<Vec<Option<BlockHeader>>, RpcError> {
        let params = blocks
            .iter()
            .map(|block| json!([block.to_rpc_param(), false]))
            .collect();
        self.batch_call("eth_getBlockByNumber", params).await
    }

    /// `eth_getCode`: deployed bytecode of `address` as of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] if the call fails.
    pub async fn code_at(&self, address: Address, block: BlockReference) -> Result<Bytes, RpcError> {
        self.call("eth_getCode", json!([address, block.to_rpc_param()]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_ignores_unused_fields() {
        let header: BlockHeader = serde_json::from_value(json!({
            "number": "0x112a880",
            "timestamp": "0x6502b3f3",
            "hash": "0x00",
            "transactions": []
        }))
        .unwrap();
        assert_eq!(header.number(), 18_000_000);
        assert_eq!(header.timestamp(), 1_694_675_955);
    }

    #[test]
    fn missing_block_is_none() {
        let header: Option<BlockHeader> = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert!(header.is_none());
    }

    #[test]
    fn code_decodes_from_hex() {
        let empty: Bytes = serde_json::from_value(json!("0x")).unwrap();
        assert!(empty.is_empty());
        let code: Bytes = serde_json::from_value(json!("0x6080")).unwrap();
        assert_eq!(code.len(), 2);
    }
}
