//! chaincall-http — HTTP JSON-RPC transport for ChainCall.

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
