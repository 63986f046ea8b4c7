//! chaincall-engine — multicall aggregation for EVM chains.
//!
//! # Architecture
//!
//! ```text
//! ContractCallGroup[] ──flatten──► CallRequest[]
//!        │
//!        ▼
//!   Batcher ──encode (Codec)──► EncodedCall[] ──pack──► batches
//!        │                                                  │
//!        │                      BatchTransport::send ◄──────┘ (≤ parallelism in flight)
//!        ▼
//!   reassemble by index ──decode (Codec)──► AggregateResponse
//! ```
//!
//! Backends live in [`backend`]: `direct-rpc`, `provider` and
//! `custom-endpoint`. [`Aggregator`] is the entry point.

pub mod aggregator;
pub mod backend;
pub mod batcher;
pub mod multicall;
pub mod observability;

pub use aggregator::{Aggregator, AggregatorBuilder, CallOptions};
pub use backend::{
    build_transport, CustomEndpointTransport, DirectRpcTransport, ProviderTransport,
};
pub use batcher::{Batcher, BatcherConfig, CallOutcome};
pub use observability::{init_tracing, LogConfig};
pub use tokio_util::sync::CancellationToken;
