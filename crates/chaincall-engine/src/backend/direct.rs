//! `direct-rpc` backend: one HTTP endpoint, aggregator contract via `eth_call`.

use std::sync::Arc;

use async_trait::async_trait;
use chaincall_core::{
    AggregatorConfig, BatchResult, BatchTransport, BlockHeight, ConfigError, EncodedCall,
    TransportError, TransportKind,
};
use chaincall_http::{HttpClientConfig, HttpRpcClient};

use super::contract::AggregatorContract;

pub struct DirectRpcTransport {
    contract: AggregatorContract,
}

impl DirectRpcTransport {
    pub fn new(client: HttpRpcClient, config: &AggregatorConfig) -> Self {
        Self {
            contract: AggregatorContract::new(
                Arc::new(client),
                config.aggregator_address(),
                config.require_success,
            ),
        }
    }

    /// Build the HTTP client for `endpointUrl` from `config`.
    pub fn from_config(config: &AggregatorConfig) -> Result<Self, ConfigError> {
        let url = config
            .endpoint_url
            .clone()
            .ok_or_else(|| ConfigError::MissingField {
                kind: TransportKind::DirectRpc.to_string(),
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
        Ok(Self::new(client, config))
    }
}

#[async_trait]
impl BatchTransport for DirectRpcTransport {
    async fn send(
        &self,
        calls: &[EncodedCall],
        at_block: Option<BlockHeight>,
    ) -> Result<BatchResult, TransportError> {
        self.contract.execute(calls, at_block).await
    }

    async fn block_number(&self) -> Result<BlockHeight, TransportError> {
        self.contract.block_number().await
    }

    fn name(&self) -> &str {
        "direct-rpc"
    }
}
