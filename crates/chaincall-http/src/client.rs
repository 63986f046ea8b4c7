//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Transient failures are retried with backoff bounded by the request
//! deadline, the endpoint sits behind a circuit breaker, and `send_batch`
//! posts one JSON array.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use chaincall_core::error::TransportError;
use chaincall_core::policy::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryPolicy};
use chaincall_core::request::{JsonRpcRequest, JsonRpcResponse};
use chaincall_core::transport::{HealthStatus, RpcTransport};

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpClientConfig {
    /// Settings for a client serving batches that each get `timeout`: one
    /// request may use the whole budget, and retries never outlive it.
    pub fn for_batches(timeout: Duration) -> Self {
        Self {
            retry: RetryConfig::default().within(timeout),
            request_timeout: timeout,
            ..Self::default()
        }
    }
}

/// HTTP JSON-RPC client with built-in reliability features.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    circuit: CircuitBreaker,
    request_timeout: Duration,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            circuit: CircuitBreaker::new(url.as_str(), config.circuit_breaker),
            url,
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    /// POST `body` once and parse the response body as `T`.
    async fn post_once<B, T>(&self, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.map_reqwest(e))?;
        if !status.is_success() {
            return Err(TransportError::Http(format!(
                "HTTP {}: {text}",
                status.as_u16()
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            TransportError::Malformed(format!("invalid JSON-RPC body from {}: {e}", self.url))
        })
    }

    /// Run `op` under the circuit breaker, retrying transient failures.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.circuit.admit()?;

        let mut backoff = self.retry.start();
        loop {
            let result = op().await;
            self.circuit.observe(&result);
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    let attempt = backoff.retries() + 1;
                    match backoff.next_delay() {
                        Some(delay) => {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                url = %self.url,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            tracing::error!(
                                attempt,
                                error = %e,
                                url = %self.url,
                                "giving up on request"
                            );
                            return Err(e);
                        }
                    }
                }
                // Non-retryable (malformed body, RPC execution error)
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(method = %req.method, url = %self.url, "rpc request");
        self.with_retry(|| self.post_once(&req)).await
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        tracing::trace!(size = reqs.len(), url = %self.url, "rpc batch request");
        self.with_retry(|| self.post_once(reqs.as_slice())).await
    }

    fn health(&self) -> HealthStatus {
        self.circuit.health()
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable(failure_threshold: u32) -> HttpRpcClient {
        // Port 9 (discard) on loopback is closed in test environments.
        HttpRpcClient::new(
            "http://127.0.0.1:9",
            HttpClientConfig {
                retry: RetryConfig {
                    max_retries: 1,
                    initial_backoff: Duration::from_millis(1),
                    max_backoff: Duration::from_millis(1),
                    multiplier: 1.0,
                    deadline: None,
                },
                circuit_breaker: CircuitBreakerConfig {
                    failure_threshold,
                    cooldown: Duration::from_secs(60),
                    trial_successes: 1,
                },
                request_timeout: Duration::from_secs(2),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn connection_refused_is_http_error() {
        let client = unreachable(10);
        let err = client.block_number(1).await.unwrap_err();
        assert!(err.is_retryable(), "got {err:?}");
        assert_eq!(client.health(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn repeated_failures_open_circuit() {
        let client = unreachable(2);
        let _ = client.block_number(1).await;
        assert_eq!(client.health(), HealthStatus::Unhealthy);
        let err = client.block_number(2).await.unwrap_err();
        assert!(matches!(err, TransportError::CircuitOpen { .. }));
    }

    #[test]
    fn batch_settings_bound_retries_by_the_timeout() {
        let config = HttpClientConfig::for_batches(Duration::from_millis(750));
        assert_eq!(config.request_timeout, Duration::from_millis(750));
        assert_eq!(config.retry.deadline, Some(Duration::from_millis(750)));
    }

    #[tokio::test]
    async fn retries_stop_at_the_deadline() {
        let client = HttpRpcClient::new(
            "http://127.0.0.1:9",
            HttpClientConfig {
                retry: RetryConfig {
                    max_retries: 50,
                    initial_backoff: Duration::from_millis(40),
                    max_backoff: Duration::from_millis(40),
                    multiplier: 1.0,
                    deadline: Some(Duration::from_millis(200)),
                },
                ..HttpClientConfig::default()
            },
        )
        .unwrap();
        let started = std::time::Instant::now();
        let err = client.block_number(1).await.unwrap_err();
        assert!(err.is_retryable(), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn empty_batch_skips_network() {
        let client = unreachable(1);
        let out = client.send_batch(vec![]).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(client.health(), HealthStatus::Healthy);
    }
}
