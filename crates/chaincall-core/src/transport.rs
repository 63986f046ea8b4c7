//! Transport traits.
//!
//! Two layers:
//! - [`RpcTransport`] moves JSON-RPC requests (HTTP client, provider pool).
//! - [`BatchTransport`] executes one batch of encoded calls and is what the
//!   batcher talks to. Each backend implements it on top of an `RpcTransport`.

use async_trait::async_trait;
use serde_json::Value;

use crate::call::{BatchResult, BlockHeight, EncodedCall};
use crate::error::TransportError;
use crate::request::{parse_quantity, JsonRpcRequest, JsonRpcResponse};

/// Provider health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Provider is responding normally.
    Healthy,
    /// Provider is responding but degraded (some providers in a pool are down).
    Degraded,
    /// Provider is not responding (circuit open).
    Unhealthy,
    /// Health status is unknown (not yet checked).
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The async trait every JSON-RPC transport implements.
///
/// Implementations must be `Send + Sync` and are stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a batch of JSON-RPC requests.
    ///
    /// Default implementation sends them sequentially; override for true batching.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// Return the current health status of this transport.
    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// Call a method and return the raw `result` value.
    async fn call(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let req = JsonRpcRequest::new(id, method, params);
        let resp = self.send(req).await?;
        resp.into_result().map_err(TransportError::Rpc)
    }

    /// Fetch the current head via `eth_blockNumber`.
    async fn block_number(&self, id: u64) -> Result<BlockHeight, TransportError> {
        let result = self.call(id, "eth_blockNumber", vec![]).await?;
        parse_quantity(&result).ok_or_else(|| {
            TransportError::Malformed(format!("eth_blockNumber returned {result}"))
        })
    }
}

/// Executes one batch of encoded calls.
///
/// `send` must return exactly one raw result per submitted call, in order, or
/// fail the whole batch. With `at_block` set, every call must be evaluated at
/// exactly that block or the batch fails with [`TransportError::StaleBlock`].
#[async_trait]
pub trait BatchTransport: Send + Sync + 'static {
    async fn send(
        &self,
        calls: &[EncodedCall],
        at_block: Option<BlockHeight>,
    ) -> Result<BatchResult, TransportError>;

    /// Current head block.
    async fn block_number(&self) -> Result<BlockHeight, TransportError>;

    /// Backend name used in log events.
    fn name(&self) -> &str;
}
