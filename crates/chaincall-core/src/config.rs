//! Aggregator configuration.
//!
//! Transport selection is an explicit value carried by [`AggregatorConfig`],
//! so several aggregators with different backends can live side by side.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::call::EncodedCall;
use crate::error::ConfigError;
use crate::policy::CircuitBreakerConfig;

/// Multicall3 deployment address, identical on every supported chain.
pub const DEFAULT_AGGREGATOR_ADDRESS: Address =
    address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Which backend executes a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// `eth_call` into the aggregator contract over a direct HTTP endpoint.
    DirectRpc,
    /// The aggregator contract reached through a provider abstraction.
    Provider,
    /// A raw JSON-RPC batch of `eth_call`s against a custom endpoint.
    CustomEndpoint,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectRpc => write!(f, "direct-rpc"),
            Self::Provider => write!(f, "provider"),
            Self::CustomEndpoint => write!(f, "custom-endpoint"),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorConfig {
    pub transport_kind: TransportKind,
    /// HTTP endpoint for `direct-rpc` and `custom-endpoint`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Failover endpoints for the `provider` backend
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_urls: Vec<String>,
    /// Overrides [`DEFAULT_AGGREGATOR_ADDRESS`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_aggregator_address: Option<Address>,
    /// Ceiling on the estimated call-data size of one batch
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
    /// Optional ceiling on the number of calls in one batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_calls: Option<usize>,
    #[serde(default = "default_per_batch_timeout_ms")]
    pub per_batch_timeout_ms: u64,
    /// Maximum batches in flight at once
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Revert the whole batch on-chain when any call fails
    #[serde(default)]
    pub require_success: bool,
    /// Informational, attached to log events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Consecutive failed batches after which the backend is skipped
    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    /// How long a tripped backend is skipped before a trial batch
    #[serde(default = "default_circuit_cooldown_ms")]
    pub circuit_cooldown_ms: u64,
}

fn default_max_batch_bytes() -> usize {
    100_000
}

fn default_per_batch_timeout_ms() -> u64 {
    30_000
}

fn default_parallelism() -> usize {
    4
}

fn default_circuit_failure_threshold() -> u32 {
    5
}

fn default_circuit_cooldown_ms() -> u64 {
    30_000
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            transport_kind: TransportKind::DirectRpc,
            endpoint_url: None,
            provider_urls: Vec::new(),
            custom_aggregator_address: None,
            max_batch_bytes: default_max_batch_bytes(),
            max_batch_calls: None,
            per_batch_timeout_ms: default_per_batch_timeout_ms(),
            parallelism: default_parallelism(),
            require_success: false,
            chain_id: None,
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_cooldown_ms: default_circuit_cooldown_ms(),
        }
    }
}

impl AggregatorConfig {
    /// Config for a direct HTTP endpoint with defaults for everything else.
    pub fn direct_rpc(endpoint_url: impl Into<String>) -> Self {
        Self {
            transport_kind: TransportKind::DirectRpc,
            endpoint_url: Some(endpoint_url.into()),
            ..Self::default()
        }
    }

    /// Address of the on-chain aggregator contract.
    pub fn aggregator_address(&self) -> Address {
        self.custom_aggregator_address.unwrap_or(DEFAULT_AGGREGATOR_ADDRESS)
    }

    pub fn per_batch_timeout(&self) -> Duration {
        Duration::from_millis(self.per_batch_timeout_ms)
    }

    /// Breaker settings for the backend as a whole.
    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_failure_threshold,
            cooldown: Duration::from_millis(self.circuit_cooldown_ms),
            trial_successes: 1,
        }
    }

    /// Parse a JSON config string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse a YAML config string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a config file; `.yaml`/`.yml` are parsed as YAML, anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw)?,
            _ => Self::from_json_str(&raw)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Full check used before building a backend from this config: the
    /// endpoint the selected kind needs, then [`validate_limits`].
    ///
    /// [`validate_limits`]: Self::validate_limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.transport_kind {
            TransportKind::DirectRpc | TransportKind::CustomEndpoint => {
                if self.endpoint_url.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::MissingField {
                        kind: self.transport_kind.to_string(),
                        field: "endpointUrl",
                    });
                }
            }
            TransportKind::Provider => {}
        }
        self.validate_limits()
    }

    /// Batching limits only. Enough when the caller supplies the backend.
    pub fn validate_limits(&self) -> Result<(), ConfigError> {
        // The smallest possible batch is one empty call inside the envelope.
        let min_bytes = EncodedCall::ENVELOPE_SIZE + 128;
        if self.max_batch_bytes < min_bytes {
            return Err(ConfigError::InvalidValue {
                field: "maxBatchBytes",
                reason: format!("must be at least {min_bytes}, got {}", self.max_batch_bytes),
            });
        }
        if self.max_batch_calls == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "maxBatchCalls",
                reason: "must be greater than zero".into(),
            });
        }
        if self.per_batch_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "perBatchTimeoutMs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parallelism",
                reason: "must be greater than zero".into(),
            });
        }
        if self.circuit_failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "circuitFailureThreshold",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults_fill_in() {
        let cfg = AggregatorConfig::from_json_str(
            r#"{"transportKind": "custom-endpoint", "endpointUrl": "http://localhost:8545"}"#,
        )
        .unwrap();
        assert_eq!(cfg.transport_kind, TransportKind::CustomEndpoint);
        assert_eq!(cfg.max_batch_bytes, 100_000);
        assert_eq!(cfg.parallelism, 4);
        assert_eq!(cfg.aggregator_address(), DEFAULT_AGGREGATOR_ADDRESS);
        cfg.validate().unwrap();
    }

    #[test]
    fn yaml_parses() {
        let cfg = AggregatorConfig::from_yaml_str(
            "transportKind: provider\nproviderUrls: [\"http://a\", \"http://b\"]\nmaxBatchCalls: 50\n",
        )
        .unwrap();
        assert_eq!(cfg.transport_kind, TransportKind::Provider);
        assert_eq!(cfg.provider_urls.len(), 2);
        assert_eq!(cfg.max_batch_calls, Some(50));
    }

    #[test]
    fn missing_endpoint_rejected() {
        let cfg = AggregatorConfig::default();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "endpointUrl", .. }));
    }

    #[test]
    fn limits_do_not_need_an_endpoint() {
        let cfg = AggregatorConfig::default();
        cfg.validate_limits().unwrap();
        let cfg = AggregatorConfig {
            max_batch_calls: Some(0),
            ..AggregatorConfig::default()
        };
        assert!(matches!(
            cfg.validate_limits(),
            Err(ConfigError::InvalidValue { field: "maxBatchCalls", .. })
        ));
    }

    #[test]
    fn tiny_ceiling_rejected() {
        let cfg = AggregatorConfig {
            max_batch_bytes: 64,
            ..AggregatorConfig::direct_rpc("http://localhost:8545")
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "maxBatchBytes", .. })
        ));
    }

    #[test]
    fn zero_parallelism_rejected() {
        let cfg = AggregatorConfig {
            parallelism: 0,
            ..AggregatorConfig::direct_rpc("http://localhost:8545")
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn custom_aggregator_address_overrides_default() {
        let addr = address!("1111111111111111111111111111111111111111");
        let cfg = AggregatorConfig {
            custom_aggregator_address: Some(addr),
            ..AggregatorConfig::default()
        };
        assert_eq!(cfg.aggregator_address(), addr);
    }
}
