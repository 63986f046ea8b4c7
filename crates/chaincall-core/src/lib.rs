//! chaincall-core — foundation traits and types for ChainCall.
//!
//! # Overview
//!
//! ChainCall aggregates many independent read-only contract calls into as few
//! remote round trips as possible and hands back one typed result per call.
//! The core crate defines:
//!
//! - [`Value`] — tagged ABI value used for arguments and return values
//! - [`call`] module — call requests, batch results and the aggregate response
//! - [`Codec`] — the ABI encode/decode seam
//! - [`BatchTransport`] — the seam every aggregate-call backend implements
//! - [`RpcTransport`] / [`JsonRpcRequest`] / [`JsonRpcResponse`] — JSON-RPC wire layer
//! - [`AggregatorConfig`] — explicit engine configuration
//! - [`policy`] module — retry and circuit breaker
//! - [`pool`] module — multi-provider failover pool

pub mod call;
pub mod codec;
pub mod config;
pub mod error;
pub mod policy;
pub mod pool;
pub mod request;
pub mod transport;
pub mod value;

pub use call::{
    AggregateResponse, BatchResult, BlockHeight, CallFailure, CallRequest, CallReturn,
    ContractCallGroup, EncodedCall, FailureKind, MethodCall, RawCallResult,
};
pub use codec::Codec;
pub use config::{AggregatorConfig, TransportKind, DEFAULT_AGGREGATOR_ADDRESS};
pub use error::{AggregateError, ConfigError, DecodingError, EncodingError, TransportError};
pub use pool::{ProviderPool, ProviderPoolConfig};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{BatchTransport, HealthStatus, RpcTransport};
pub use value::Value;
