//! Reliability policies shared by the transports and the batcher.
//!
//! ```text
//! batch  → [CircuitBreaker per backend] → BatchTransport
//! request → [CircuitBreaker per endpoint] → [Backoff within deadline] → HTTP
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{Backoff, RetryConfig, RetryPolicy};
