//! `eth_call` into the aggregator contract over any [`RpcTransport`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use chaincall_core::request::block_tag;
use chaincall_core::{BatchResult, BlockHeight, EncodedCall, RpcTransport, TransportError};
use serde_json::json;

use crate::multicall::{decode_aggregate, encode_aggregate};

/// Shared by the `direct-rpc` and `provider` backends; they differ only in
/// the [`RpcTransport`] underneath.
pub struct AggregatorContract {
    rpc: Arc<dyn RpcTransport>,
    address: Address,
    require_success: bool,
    next_id: AtomicU64,
}

impl AggregatorContract {
    pub fn new(rpc: Arc<dyn RpcTransport>, address: Address, require_success: bool) -> Self {
        Self {
            rpc,
            address,
            require_success,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn rpc(&self) -> &Arc<dyn RpcTransport> {
        &self.rpc
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Execute `calls` in one `tryBlockAndAggregate` at `at_block` (latest if absent).
    pub async fn execute(
        &self,
        calls: &[EncodedCall],
        at_block: Option<BlockHeight>,
    ) -> Result<BatchResult, TransportError> {
        let data = encode_aggregate(calls, self.require_success);
        let params = vec![
            json!({ "to": self.address, "data": data }),
            block_tag(at_block),
        ];

        let result = self
            .rpc
            .call(self.id(), "eth_call", params)
            .await
            .map_err(|e| match (e, at_block) {
                (TransportError::Rpc(err), Some(requested)) if err.is_block_unavailable() => {
                    TransportError::StaleBlock {
                        requested,
                        returned: None,
                    }
                }
                (e, _) => e,
            })?;

        let raw: Bytes = serde_json::from_value(result.clone()).map_err(|_| {
            TransportError::Malformed(format!("eth_call returned {result}"))
        })?;
        let batch = decode_aggregate(&raw, calls.len())?;

        if let Some(requested) = at_block {
            if batch.block_number != requested {
                return Err(TransportError::StaleBlock {
                    requested,
                    returned: Some(batch.block_number),
                });
            }
        }
        Ok(batch)
    }

    pub async fn block_number(&self) -> Result<BlockHeight, TransportError> {
        self.rpc.block_number(self.id()).await
    }
}
