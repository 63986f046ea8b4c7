//! `provider` backend: the aggregator contract reached through any
//! [`RpcTransport`], by default a failover [`ProviderPool`].

use std::sync::Arc;

use async_trait::async_trait;
use chaincall_core::{
    AggregatorConfig, BatchResult, BatchTransport, BlockHeight, ConfigError, EncodedCall,
    ProviderPool, ProviderPoolConfig, RpcTransport, TransportError, TransportKind,
};
use chaincall_http::{HttpClientConfig, HttpRpcClient};

use super::contract::AggregatorContract;

pub struct ProviderTransport {
    contract: AggregatorContract,
}

impl ProviderTransport {
    /// Wrap a caller-supplied provider.
    pub fn new(provider: Arc<dyn RpcTransport>, config: &AggregatorConfig) -> Self {
        Self {
            contract: AggregatorContract::new(
                provider,
                config.aggregator_address(),
                config.require_success,
            ),
        }
    }

    /// Build a [`ProviderPool`] over `providerUrls` (or `endpointUrl` alone).
    pub fn from_config(config: &AggregatorConfig) -> Result<Self, ConfigError> {
        let urls: Vec<String> = if config.provider_urls.is_empty() {
            config.endpoint_url.iter().cloned().collect()
        } else {
            config.provider_urls.clone()
        };
        if urls.is_empty() {
            return Err(ConfigError::MissingField {
                kind: TransportKind::Provider.to_string(),
                field: "providerUrls",
            });
        }

        let client_config = HttpClientConfig::for_batches(config.per_batch_timeout());
        let mut transports: Vec<Arc<dyn RpcTransport>> = Vec::with_capacity(urls.len());
        for url in urls {
            let client = HttpRpcClient::new(url, client_config.clone()).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "providerUrls",
                    reason: e.to_string(),
                }
            })?;
            transports.push(Arc::new(client));
        }

        let pool = ProviderPool::new(
            transports,
            ProviderPoolConfig {
                request_timeout: config.per_batch_timeout(),
                ..Default::default()
            },
        );
        Ok(Self::new(Arc::new(pool), config))
    }

    pub fn provider(&self) -> &Arc<dyn RpcTransport> {
        self.contract.rpc()
    }
}

#[async_trait]
impl BatchTransport for ProviderTransport {
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
        "provider"
    }
}
