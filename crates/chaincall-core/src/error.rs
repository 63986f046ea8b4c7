//! Error types for the ChainCall pipeline.

use thiserror::Error;

use crate::call::BlockHeight;
use crate::request::JsonRpcError;

/// Errors raised while turning a method call into call-data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("function '{method}' not found in ABI")]
    MethodNotFound { method: String },

    #[error("argument count mismatch for '{method}': ABI has {expected}, got {got}")]
    ArgumentCount {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("param {index} of '{method}': {reason}")]
    TypeMismatch {
        method: String,
        index: usize,
        reason: String,
    },

    #[error("ABI type resolution failed: {0}")]
    InvalidAbi(String),
}

/// Errors raised while decoding return data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodingError {
    #[error("empty return data for '{method}'")]
    Empty { method: String },

    #[error("function '{method}' not found in ABI")]
    MethodNotFound { method: String },

    #[error("return data for '{method}' is {got} bytes, layout needs at least {min}")]
    TooShort {
        method: String,
        min: usize,
        got: usize,
    },

    #[error("ABI decode failed for '{method}': {reason}")]
    Malformed { method: String, reason: String },
}

/// Errors that can occur during a transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Circuit breaker is open — provider is unhealthy.
    #[error("Circuit breaker open for provider: {provider}")]
    CircuitOpen { provider: String },

    /// All providers in the pool are unavailable.
    #[error("All providers unavailable")]
    AllProvidersDown,

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response count does not match the submitted batch.
    #[error("Response length mismatch: submitted {expected} calls, got {got} results")]
    LengthMismatch { expected: usize, got: usize },

    /// The backend cannot guarantee evaluation at the requested block.
    #[error("Stale block: requested {requested}, backend reported {}", .returned.map(|b| b.to_string()).unwrap_or_else(|| "unavailable".into()))]
    StaleBlock {
        requested: BlockHeight,
        returned: Option<BlockHeight>,
    },

    /// Remote answered with something that is not a valid response.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }

    /// Returns `true` if the error says the backend itself is unhealthy, as
    /// opposed to the node rejecting what it was asked to execute.
    pub fn is_backend_fault(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Timeout { .. }
                | Self::Malformed(_)
                | Self::Deserialization(_)
                | Self::LengthMismatch { .. }
                | Self::AllProvidersDown
        )
    }

    /// Returns `true` if the batch could not be pinned to the requested block.
    pub fn is_stale_block(&self) -> bool {
        matches!(self, Self::StaleBlock { .. })
    }
}

/// Invalid engine configuration, detected before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("transport '{kind}' requires {field}")]
    MissingField { kind: String, field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(String),
}

/// Errors that abort a whole aggregate call.
///
/// Everything narrower than this is reported per call inside the response.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("aggregate call cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A transport-wide failure, e.g. the head block could not be resolved.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
