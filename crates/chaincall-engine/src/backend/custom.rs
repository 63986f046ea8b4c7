//! `custom-endpoint` backend: one JSON-RPC batch of plain `eth_call`s.
//!
//! No aggregator contract is involved, so the block must be pinned
//! explicitly: at latest the head is resolved first and every call in the
//! batch is evaluated at that height.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use chaincall_core::request::block_tag;
use chaincall_core::{
    AggregatorConfig, BatchResult, BatchTransport, BlockHeight, ConfigError, EncodedCall,
    JsonRpcRequest, RawCallResult, RpcId, RpcTransport, TransportError, TransportKind,
};
use chaincall_http::{HttpClientConfig, HttpRpcClient};
use serde_json::json;

pub struct CustomEndpointTransport {
    rpc: Arc<dyn RpcTransport>,
    next_id: AtomicU64,
}

impl CustomEndpointTransport {
    pub fn new(rpc: Arc<dyn RpcTransport>) -> Self {
        Self {
            rpc,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &AggregatorConfig) -> Result<Self, ConfigError> {
        let url = config
            .endpoint_url
            .clone()
            .ok_or_else(|| ConfigError::MissingField {
                kind: TransportKind::CustomEndpoint.to_string(),
                field: "endpointUrl",
            })?;
        let client = HttpRpcClient::new(
            url,
            HttpClientConfig::for_batches(config.per_batch_timeout()),
        )
        .map_err(|e| ConfigError::InvalidValue {
            field: "endpointUrl",
            reason: e.to_string(),
        })?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Reserve `n` consecutive request ids.
    fn ids(&self, n: usize) -> u64 {
        self.next_id.fetch_add(n as u64, Ordering::Relaxed)
    }
}

#[async_trait]
impl BatchTransport for CustomEndpointTransport {
    async fn send(
        &self,
        calls: &[EncodedCall],
        at_block: Option<BlockHeight>,
    ) -> Result<BatchResult, TransportError> {
        let block = match at_block {
            Some(n) => n,
            None => self.block_number().await?,
        };
        if calls.is_empty() {
            return Ok(BatchResult {
                block_number: block,
                results: Vec::new(),
            });
        }

        let first_id = self.ids(calls.len());
        let tag = block_tag(Some(block));
        let reqs: Vec<JsonRpcRequest> = calls
            .iter()
            .enumerate()
            .map(|(i, call)| {
                JsonRpcRequest::new(
                    first_id + i as u64,
                    "eth_call",
                    vec![json!({ "to": call.target, "data": call.data }), tag.clone()],
                )
            })
            .collect();

        let resps = self.rpc.send_batch(reqs).await?;
        if resps.len() != calls.len() {
            return Err(TransportError::LengthMismatch {
                expected: calls.len(),
                got: resps.len(),
            });
        }

        // Nodes may answer a batch in any order.
        let mut by_id: HashMap<RpcId, _> = resps.into_iter().map(|r| (r.id.clone(), r)).collect();

        let mut results = Vec::with_capacity(calls.len());
        for i in 0..calls.len() {
            let id = RpcId::Number(first_id + i as u64);
            let resp = by_id
                .remove(&id)
                .ok_or_else(|| TransportError::Malformed(format!("no response for id {id}")))?;

            let raw = match resp.into_result() {
                Ok(value) => {
                    let data: Bytes = serde_json::from_value(value.clone()).map_err(|_| {
                        TransportError::Malformed(format!("eth_call returned {value}"))
                    })?;
                    RawCallResult::ok(data)
                }
                Err(err) if err.is_revert() => {
                    RawCallResult::reverted(err.revert_data().unwrap_or_default())
                }
                Err(err) if err.is_block_unavailable() => {
                    return Err(TransportError::StaleBlock {
                        requested: block,
                        returned: None,
                    })
                }
                Err(err) => return Err(TransportError::Rpc(err)),
            };
            results.push(raw);
        }

        Ok(BatchResult {
            block_number: block,
            results,
        })
    }

    async fn block_number(&self) -> Result<BlockHeight, TransportError> {
        self.rpc.block_number(self.ids(1)).await
    }

    fn name(&self) -> &str {
        "custom-endpoint"
    }
}
