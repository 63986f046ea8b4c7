//! The three [`BatchTransport`] backends.
//!
//! | kind              | wire                                   | block source      |
//! |-------------------|----------------------------------------|-------------------|
//! | `direct-rpc`      | `eth_call` → Multicall3, one endpoint  | contract return   |
//! | `provider`        | `eth_call` → Multicall3, provider pool | contract return   |
//! | `custom-endpoint` | JSON-RPC batch of `eth_call`s          | pinned block tag  |

pub mod contract;
pub mod custom;
pub mod direct;
pub mod provider;

use std::sync::Arc;

use chaincall_core::{AggregatorConfig, BatchTransport, ConfigError, TransportKind};

pub use contract::AggregatorContract;
pub use custom::CustomEndpointTransport;
pub use direct::DirectRpcTransport;
pub use provider::ProviderTransport;

/// Build the backend selected by `config.transport_kind`.
pub fn build_transport(config: &AggregatorConfig) -> Result<Arc<dyn BatchTransport>, ConfigError> {
    config.validate()?;
    let transport: Arc<dyn BatchTransport> = match config.transport_kind {
        TransportKind::DirectRpc => Arc::new(DirectRpcTransport::from_config(config)?),
        TransportKind::Provider => Arc::new(ProviderTransport::from_config(config)?),
        TransportKind::CustomEndpoint => Arc::new(CustomEndpointTransport::from_config(config)?),
    };
    tracing::debug!(
        kind = %config.transport_kind,
        chain_id = ?config.chain_id,
        aggregator = %config.aggregator_address(),
        "transport built"
    );
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_each_kind() {
        let direct = AggregatorConfig::direct_rpc("http://localhost:8545");
        assert_eq!(build_transport(&direct).unwrap().name(), "direct-rpc");

        let custom = AggregatorConfig {
            transport_kind: TransportKind::CustomEndpoint,
            ..direct.clone()
        };
        assert_eq!(build_transport(&custom).unwrap().name(), "custom-endpoint");

        let provider = AggregatorConfig {
            transport_kind: TransportKind::Provider,
            ..direct
        };
        assert_eq!(build_transport(&provider).unwrap().name(), "provider");
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let config = AggregatorConfig {
            parallelism: 0,
            ..AggregatorConfig::direct_rpc("http://localhost:8545")
        };
        assert!(matches!(
            build_transport(&config),
            Err(ConfigError::InvalidValue { field: "parallelism", .. })
        ));
    }
}
