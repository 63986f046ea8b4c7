//! Circuit breaker guarding one backend.
//!
//! The breaker is fed with whole outcomes through [`CircuitBreaker::observe`].
//! Only failures that say something about the backend's health count
//! against it (see [`TransportError::is_backend_fault`]). A reverted call,
//! an RPC execution error or a stale block leave the count untouched.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::transport::HealthStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive backend faults that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects work before letting a trial through.
    pub cooldown: Duration,
    /// Successful trials needed to close a half-open circuit.
    pub trial_successes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            trial_successes: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { faults: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

/// Shared breaker; clones observe and gate the same backend.
#[derive(Clone)]
pub struct CircuitBreaker {
    label: Arc<str>,
    config: CircuitBreakerConfig,
    phase: Arc<Mutex<Phase>>,
}

impl CircuitBreaker {
    /// `label` names the backend in errors and log events.
    pub fn new(label: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            label: label.into(),
            config,
            phase: Arc::new(Mutex::new(Phase::Closed { faults: 0 })),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        // Phase is Copy and always written whole, so a poisoned lock still
        // holds a consistent value.
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state. An open circuit whose cooldown has elapsed turns
    /// half-open here.
    pub fn state(&self) -> CircuitState {
        let mut phase = self.lock();
        if let Phase::Open { since } = *phase {
            if since.elapsed() >= self.config.cooldown {
                *phase = Phase::HalfOpen { successes: 0 };
                tracing::info!(backend = %self.label, "circuit half-open, admitting trial");
            }
        }
        match *phase {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn health(&self) -> HealthStatus {
        match self.state() {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Open => HealthStatus::Unhealthy,
        }
    }

    /// `Err(CircuitOpen)` while the backend should not be used.
    pub fn admit(&self) -> Result<(), TransportError> {
        match self.state() {
            CircuitState::Open => Err(TransportError::CircuitOpen {
                provider: self.label.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Feed one finished operation into the breaker.
    pub fn observe<T>(&self, outcome: &Result<T, TransportError>) {
        match outcome {
            Ok(_) => self.on_success(),
            Err(e) if e.is_backend_fault() => self.on_fault(e),
            Err(_) => {}
        }
    }

    fn on_success(&self) {
        let mut phase = self.lock();
        *phase = match *phase {
            Phase::HalfOpen { successes } if successes + 1 < self.config.trial_successes => {
                Phase::HalfOpen {
                    successes: successes + 1,
                }
            }
            Phase::HalfOpen { .. } => {
                tracing::info!(backend = %self.label, "circuit closed");
                Phase::Closed { faults: 0 }
            }
            Phase::Closed { .. } => Phase::Closed { faults: 0 },
            open @ Phase::Open { .. } => open,
        };
    }

    fn on_fault(&self, error: &TransportError) {
        let mut phase = self.lock();
        *phase = match *phase {
            Phase::Closed { faults } if faults + 1 < self.config.failure_threshold => {
                Phase::Closed { faults: faults + 1 }
            }
            Phase::Closed { faults } => {
                tracing::warn!(
                    backend = %self.label,
                    faults = faults + 1,
                    error = %error,
                    "circuit open"
                );
                Phase::Open {
                    since: Instant::now(),
                }
            }
            Phase::HalfOpen { .. } => {
                tracing::warn!(backend = %self.label, error = %error, "trial failed, circuit open");
                Phase::Open {
                    since: Instant::now(),
                }
            }
            open @ Phase::Open { .. } => open,
        };
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("backend", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "multicall",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown,
                trial_successes: 1,
            },
        )
    }

    fn fault() -> Result<(), TransportError> {
        Err(TransportError::Timeout { ms: 10 })
    }

    #[test]
    fn consecutive_faults_open_the_circuit() {
        let cb = breaker(3, Duration::from_secs(60));
        cb.observe(&fault());
        cb.observe(&fault());
        assert!(cb.admit().is_ok());
        cb.observe(&fault());
        assert_eq!(cb.state(), CircuitState::Open);
        match cb.admit() {
            Err(TransportError::CircuitOpen { provider }) => assert_eq!(provider, "multicall"),
            other => panic!("expected CircuitOpen, got {other:?}"),
        }
        assert_eq!(cb.health(), HealthStatus::Unhealthy);
    }

    #[test]
    fn success_between_faults_resets_the_count() {
        let cb = breaker(2, Duration::from_secs(60));
        cb.observe(&fault());
        cb.observe(&Ok::<_, TransportError>(()));
        cb.observe(&fault());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn execution_errors_do_not_count() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.observe(&Err::<(), _>(TransportError::StaleBlock {
            requested: 5,
            returned: Some(6),
        }));
        cb.observe(&Err::<(), _>(TransportError::Rpc(crate::JsonRpcError {
            code: 3,
            message: "execution reverted".into(),
            data: None,
        })));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn trial_success_closes_after_cooldown() {
        let cb = breaker(1, Duration::ZERO);
        cb.observe(&fault());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.health(), HealthStatus::Degraded);
        cb.observe(&Ok::<_, TransportError>(()));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn failed_trial_reopens() {
        let cb = breaker(1, Duration::ZERO);
        cb.observe(&fault());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.observe(&fault());
        assert!(matches!(*cb.lock(), Phase::Open { .. }));
    }
}
