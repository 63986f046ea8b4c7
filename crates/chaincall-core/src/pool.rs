//! Multi-provider failover pool with round-robin selection and health tracking.
//!
//! The pool is itself an [`RpcTransport`], so the `provider` backend can run
//! the aggregator-contract call over several endpoints without knowing it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::policy::{CircuitBreaker, CircuitBreakerConfig};
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::{HealthStatus, RpcTransport};

#[derive(Debug, Clone)]
pub struct ProviderPoolConfig {
    /// Circuit breaker config applied to every provider.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Timeout per request, per provider.
    pub request_timeout: Duration,
}

impl Default for ProviderPoolConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct ProviderSlot {
    transport: Arc<dyn RpcTransport>,
    circuit: CircuitBreaker,
}

/// Round-robin provider pool with per-provider circuit breakers.
///
/// A request goes to the next provider whose circuit is not open. On a
/// transient failure the pool moves on to the next healthy provider, trying
/// each at most once per request.
pub struct ProviderPool {
    slots: Vec<ProviderSlot>,
    cursor: AtomicUsize,
    config: ProviderPoolConfig,
}

impl ProviderPool {
    pub fn new(transports: Vec<Arc<dyn RpcTransport>>, config: ProviderPoolConfig) -> Self {
        let slots = transports
            .into_iter()
            .map(|t| ProviderSlot {
                circuit: CircuitBreaker::new(t.url(), config.circuit_breaker.clone()),
                transport: t,
            })
            .collect();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Allowed slots in round-robin order, starting at the cursor.
    fn candidates(&self) -> Vec<&ProviderSlot> {
        if self.slots.is_empty() {
            return Vec::new();
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        (0..self.slots.len())
            .map(|i| &self.slots[(start + i) % self.slots.len()])
            .filter(|slot| slot.circuit.admit().is_ok())
            .collect()
    }

    async fn with_failover<T, F, Fut>(&self, op: F) -> Result<T, TransportError>
    where
        F: Fn(Arc<dyn RpcTransport>) -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let timeout = self.config.request_timeout;
        let mut last_err = TransportError::AllProvidersDown;
        for slot in self.candidates() {
            let result = tokio::time::timeout(timeout, op(Arc::clone(&slot.transport)))
                .await
                .unwrap_or(Err(TransportError::Timeout {
                    ms: timeout.as_millis() as u64,
                }));
            slot.circuit.observe(&result);
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(provider = slot.transport.url(), error = %e, "provider failed, trying next");
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }
}

#[async_trait]
impl RpcTransport for ProviderPool {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.with_failover(|t| {
            let req = req.clone();
            async move { t.send(req).await }
        })
        .await
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        self.with_failover(|t| {
            let reqs = reqs.clone();
            async move { t.send_batch(reqs).await }
        })
        .await
    }

    fn health(&self) -> HealthStatus {
        let healthy = self
            .slots
            .iter()
            .filter(|s| s.circuit.state() != crate::policy::CircuitState::Open)
            .count();
        match healthy {
            0 => HealthStatus::Unhealthy,
            n if n == self.slots.len() => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        }
    }

    fn url(&self) -> &str {
        "pool"
    }
}
