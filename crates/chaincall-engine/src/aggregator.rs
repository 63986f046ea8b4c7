//! `Aggregator` — the public façade.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chaincall_core::{ContractCallGroup, MethodCall, Value};
//! use chaincall_engine::AggregatorBuilder;
//!
//! # async fn run(abi: Arc<alloy_json_abi::JsonAbi>, token: alloy_primitives::Address,
//! #              holder: alloy_primitives::Address) -> Result<(), Box<dyn std::error::Error>> {
//! let aggregator = AggregatorBuilder::new()
//!     .endpoint_url("https://eth.llamarpc.com")
//!     .max_batch_bytes(50_000)
//!     .build()?;
//!
//! let group = ContractCallGroup::new("usdc", token, abi)
//!     .call(MethodCall::new("bal", "balanceOf", vec![Value::Address(holder)]));
//! let response = aggregator.call(vec![group]).await?;
//! println!("{} decoded at block {}", response.decoded_count(), response.block_number);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use chaincall_codec::AbiCodec;
use chaincall_core::{
    AggregateError, AggregateResponse, AggregatorConfig, BatchTransport, BlockHeight,
    CallFailure, CallRequest, CallReturn, Codec, ConfigError, ContractCallGroup, FailureKind,
    TransportKind,
};
use tokio_util::sync::CancellationToken;

use crate::backend::build_transport;
use crate::batcher::{BatchRun, Batcher, BatcherConfig, CallOutcome};

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Evaluate every call at this block instead of latest.
    pub at_block: Option<BlockHeight>,
    /// Cancel the invocation; in-flight batches are detached.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn at_block(block: BlockHeight) -> Self {
        Self {
            at_block: Some(block),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Aggregates many read-only contract calls into as few round trips as the
/// batch ceiling allows.
///
/// Holds no per-call state, so one instance can serve concurrent calls.
pub struct Aggregator {
    config: AggregatorConfig,
    batcher: Batcher,
    codec: Arc<dyn Codec>,
    transport: Arc<dyn BatchTransport>,
}

impl Aggregator {
    /// Aggregator over a caller-supplied backend with the default ABI codec.
    pub fn new(
        config: AggregatorConfig,
        transport: Arc<dyn BatchTransport>,
    ) -> Result<Self, ConfigError> {
        Self::with_codec(config, transport, Arc::new(AbiCodec))
    }

    pub fn with_codec(
        config: AggregatorConfig,
        transport: Arc<dyn BatchTransport>,
        codec: Arc<dyn Codec>,
    ) -> Result<Self, ConfigError> {
        // The backend is already built, so endpoint fields are not needed.
        config.validate_limits()?;
        let batcher = Batcher::new(
            Arc::clone(&transport),
            Arc::clone(&codec),
            BatcherConfig::from(&config),
        );
        Ok(Self {
            config,
            batcher,
            codec,
            transport,
        })
    }

    /// Build the backend named by `config.transport_kind`.
    pub fn from_config(config: AggregatorConfig) -> Result<Self, ConfigError> {
        let transport = build_transport(&config)?;
        Self::new(config, transport)
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn BatchTransport> {
        &self.transport
    }

    /// Execute every call in `groups` at latest.
    pub async fn call(
        &self,
        groups: Vec<ContractCallGroup>,
    ) -> Result<AggregateResponse, AggregateError> {
        self.call_with(groups, CallOptions::default()).await
    }

    /// Execute every call in `groups` at `block`.
    pub async fn call_at_block(
        &self,
        groups: Vec<ContractCallGroup>,
        block: BlockHeight,
    ) -> Result<AggregateResponse, AggregateError> {
        self.call_with(groups, CallOptions::at_block(block)).await
    }

    /// Execute every call in `groups`.
    ///
    /// Returns one [`CallReturn`] per flattened call, in order. Errors only
    /// on cancellation or when the head block cannot be resolved.
    pub async fn call_with(
        &self,
        groups: Vec<ContractCallGroup>,
        options: CallOptions,
    ) -> Result<AggregateResponse, AggregateError> {
        let requests = ContractCallGroup::flatten(groups);
        let cancel = options.cancel.unwrap_or_default();

        let BatchRun {
            block_number,
            outcomes,
            ..
        } = self.batcher.run(&requests, options.at_block, &cancel).await?;

        let results = requests
            .iter()
            .zip(outcomes)
            .map(|(req, outcome)| self.finish(req, outcome))
            .collect();

        Ok(AggregateResponse {
            block_number,
            results,
        })
    }

    /// Current head block as seen by the backend.
    pub async fn block_number(&self) -> Result<BlockHeight, AggregateError> {
        Ok(self.transport.block_number().await?)
    }

    fn finish(&self, req: &CallRequest, outcome: CallOutcome) -> CallReturn {
        match outcome {
            CallOutcome::Returned(raw) if raw.success => {
                match self.codec.decode(&req.abi, &req.method_name, &raw.return_data) {
                    Ok(values) => CallReturn::success(req, values),
                    Err(e) => CallReturn::failure(
                        req,
                        CallFailure::new(FailureKind::Decoding, e.to_string()),
                        Some(raw.return_data),
                    ),
                }
            }
            CallOutcome::Returned(raw) => {
                let message = self
                    .codec
                    .describe_revert(&req.abi, &raw.return_data)
                    .unwrap_or_else(|| "execution reverted".to_string());
                CallReturn::failure(
                    req,
                    CallFailure::new(FailureKind::Reverted, message),
                    Some(raw.return_data),
                )
            }
            CallOutcome::Failed(failure) => CallReturn::failure(req, failure, None),
        }
    }
}

/// Fluent builder for [`Aggregator`].
#[derive(Default)]
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    transport: Option<Arc<dyn BatchTransport>>,
    codec: Option<Arc<dyn Codec>>,
}

impl AggregatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config.
    pub fn from_config(config: AggregatorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn transport_kind(mut self, kind: TransportKind) -> Self {
        self.config.transport_kind = kind;
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = Some(url.into());
        self
    }

    /// Add a failover endpoint for the `provider` backend.
    pub fn provider_url(mut self, url: impl Into<String>) -> Self {
        self.config.provider_urls.push(url.into());
        self
    }

    pub fn aggregator_address(mut self, address: Address) -> Self {
        self.config.custom_aggregator_address = Some(address);
        self
    }

    pub fn max_batch_bytes(mut self, bytes: usize) -> Self {
        self.config.max_batch_bytes = bytes;
        self
    }

    pub fn max_batch_calls(mut self, calls: usize) -> Self {
        self.config.max_batch_calls = Some(calls);
        self
    }

    pub fn per_batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.per_batch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn parallelism(mut self, n: usize) -> Self {
        self.config.parallelism = n;
        self
    }

    pub fn require_success(mut self, yes: bool) -> Self {
        self.config.require_success = yes;
        self
    }

    pub fn chain_id(mut self, id: u64) -> Self {
        self.config.chain_id = Some(id);
        self
    }

    /// Use this backend instead of building one from the config.
    pub fn transport(mut self, transport: Arc<dyn BatchTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn build(self) -> Result<Aggregator, ConfigError> {
        let transport = match self.transport {
            Some(t) => t,
            None => build_transport(&self.config)?,
        };
        let codec = self.codec.unwrap_or_else(|| Arc::new(AbiCodec));
        Aggregator::with_codec(self.config, transport, codec)
    }
}
