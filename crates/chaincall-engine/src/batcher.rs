//! `Batcher` — encodes calls, packs them under the size ceiling, dispatches
//! the batches and reassembles raw results in request order.
//!
//! Batches run as independent Tokio tasks, at most `parallelism` at a time.
//! Every call is tagged with its request index before packing, so the order
//! batches complete in never matters.
//!
//! Every batch outcome feeds a circuit breaker for the backend. Once it
//! trips, batches that have not been dispatched yet fail with
//! `CircuitOpen` without touching the backend, in this call and in later
//! ones, until the cooldown lets a trial batch through.

use std::sync::Arc;
use std::time::Duration;

use chaincall_core::policy::{CircuitBreaker, CircuitBreakerConfig};
use chaincall_core::{
    AggregateError, AggregatorConfig, BatchResult, BatchTransport, BlockHeight, CallFailure,
    CallRequest, Codec, EncodedCall, FailureKind, RawCallResult, TransportError,
};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Packing and dispatch limits.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Ceiling on the estimated `tryBlockAndAggregate` call-data size
    pub max_batch_bytes: usize,
    pub max_batch_calls: Option<usize>,
    pub parallelism: usize,
    pub per_batch_timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl From<&AggregatorConfig> for BatcherConfig {
    fn from(config: &AggregatorConfig) -> Self {
        Self {
            max_batch_bytes: config.max_batch_bytes,
            max_batch_calls: config.max_batch_calls,
            parallelism: config.parallelism.max(1),
            per_batch_timeout: config.per_batch_timeout(),
            circuit_breaker: config.circuit_breaker(),
        }
    }
}

/// What happened to one call before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call executed; it may still have reverted.
    Returned(RawCallResult),
    /// The call never produced raw data.
    Failed(CallFailure),
}

/// Result of [`Batcher::run`], one outcome per request in request order.
#[derive(Debug)]
pub struct BatchRun {
    pub block_number: BlockHeight,
    pub outcomes: Vec<CallOutcome>,
    /// Number of batches submitted to the transport.
    pub batches: usize,
}

/// A group of encoded calls that fits in one transport send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBatch {
    /// Request index of each call, in submission order.
    pub indices: Vec<usize>,
    pub calls: Vec<EncodedCall>,
    /// Estimated call-data size including the envelope.
    pub size: usize,
}

impl PlannedBatch {
    fn new() -> Self {
        Self {
            indices: Vec::new(),
            calls: Vec::new(),
            size: EncodedCall::ENVELOPE_SIZE,
        }
    }

    fn push(&mut self, index: usize, call: EncodedCall, size: usize) {
        self.indices.push(index);
        self.calls.push(call);
        self.size += size;
    }
}

/// Greedily pack `encoded` into batches.
///
/// A batch is closed when the next call would push it over `max_bytes` or
/// past `max_calls`. Calls that exceed `max_bytes` on their own are returned
/// separately as `(index, estimated size)` and never submitted.
pub fn plan_batches(
    encoded: Vec<(usize, EncodedCall)>,
    max_bytes: usize,
    max_calls: Option<usize>,
) -> (Vec<PlannedBatch>, Vec<(usize, usize)>) {
    let mut batches = Vec::new();
    let mut oversized = Vec::new();
    let mut current = PlannedBatch::new();

    for (index, call) in encoded {
        let size = call.estimated_size();
        if EncodedCall::ENVELOPE_SIZE + size > max_bytes {
            oversized.push((index, size));
            continue;
        }
        let over_bytes = current.size + size > max_bytes;
        let over_count = max_calls.is_some_and(|max| current.calls.len() >= max);
        if !current.calls.is_empty() && (over_bytes || over_count) {
            batches.push(std::mem::replace(&mut current, PlannedBatch::new()));
        }
        current.push(index, call, size);
    }
    if !current.calls.is_empty() {
        batches.push(current);
    }
    (batches, oversized)
}

/// Encodes, packs, dispatches and reassembles one aggregate call.
pub struct Batcher {
    transport: Arc<dyn BatchTransport>,
    codec: Arc<dyn Codec>,
    circuit: CircuitBreaker,
    config: BatcherConfig,
}

impl Batcher {
    pub fn new(
        transport: Arc<dyn BatchTransport>,
        codec: Arc<dyn Codec>,
        config: BatcherConfig,
    ) -> Self {
        let circuit = CircuitBreaker::new(transport.name(), config.circuit_breaker.clone());
        Self {
            transport,
            codec,
            circuit,
            config,
        }
    }

    /// Breaker guarding the backend across calls.
    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    /// Execute `requests` at `at_block` (latest if absent).
    ///
    /// Fails as a whole only on cancellation or when the head block cannot
    /// be resolved; every other failure is recorded against the calls it
    /// affects.
    pub async fn run(
        &self,
        requests: &[CallRequest],
        at_block: Option<BlockHeight>,
        cancel: &CancellationToken,
    ) -> Result<BatchRun, AggregateError> {
        if cancel.is_cancelled() {
            return Err(AggregateError::Cancelled);
        }

        let mut outcomes: Vec<Option<CallOutcome>> = vec![None; requests.len()];

        // 1. encode
        let mut encoded = Vec::with_capacity(requests.len());
        for (index, req) in requests.iter().enumerate() {
            match self.codec.encode(&req.abi, &req.method_name, &req.arguments) {
                Ok(data) => encoded.push((
                    index,
                    EncodedCall {
                        target: req.contract_address,
                        data,
                    },
                )),
                Err(e) => {
                    debug!(reference = %req.reference, error = %e, "encoding failed");
                    outcomes[index] = Some(CallOutcome::Failed(CallFailure::new(
                        FailureKind::Encoding,
                        e.to_string(),
                    )));
                }
            }
        }

        // 2. pack
        let (batches, oversized) = plan_batches(
            encoded,
            self.config.max_batch_bytes,
            self.config.max_batch_calls,
        );
        for (index, size) in oversized {
            warn!(
                reference = %requests[index].reference,
                size,
                max_batch_bytes = self.config.max_batch_bytes,
                "call exceeds batch ceiling on its own"
            );
            outcomes[index] = Some(CallOutcome::Failed(CallFailure::new(
                FailureKind::Oversized,
                format!(
                    "call needs {} bytes with envelope, ceiling is {}",
                    EncodedCall::ENVELOPE_SIZE + size,
                    self.config.max_batch_bytes
                ),
            )));
        }

        if batches.is_empty() {
            let block_number = match at_block {
                Some(n) => n,
                None => self.head(cancel).await?,
            };
            return Ok(BatchRun {
                block_number,
                outcomes: finish(outcomes),
                batches: 0,
            });
        }

        // 3. pin every batch to one height
        let pinned = match at_block {
            Some(n) => Some(n),
            None if batches.len() > 1 => {
                let head = self.head(cancel).await?;
                debug!(head, batches = batches.len(), "pinned multi-batch call to head");
                Some(head)
            }
            None => None,
        };

        // 4. dispatch
        let batch_count = batches.len();
        let timeout = self.config.per_batch_timeout;
        let mut members = Vec::with_capacity(batch_count);
        let jobs: Vec<(usize, Vec<EncodedCall>)> = batches
            .into_iter()
            .enumerate()
            .map(|(batch, planned)| {
                debug!(batch, calls = planned.calls.len(), bytes = planned.size, "batch planned");
                members.push(planned.indices);
                (batch, planned.calls)
            })
            .collect();

        let dispatch = stream::iter(jobs)
            .map(|(batch, calls)| {
                let transport = Arc::clone(&self.transport);
                let circuit = self.circuit.clone();
                // checked when the batch is actually dispatched
                let admitted = self.circuit.admit();
                let expected = calls.len();
                let handle = tokio::spawn(async move {
                    admitted?;
                    match tokio::time::timeout(timeout, transport.send(&calls, pinned)).await {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout {
                            ms: timeout.as_millis() as u64,
                        }),
                    }
                });
                async move {
                    let result = handle.await.unwrap_or_else(|e| {
                        Err(TransportError::Other(format!("batch task failed: {e}")))
                    });
                    let result = result
                        .and_then(|r| check_len(r, expected))
                        .and_then(|r| check_block(r, pinned));
                    circuit.observe(&result);
                    (batch, result)
                }
            })
            .buffer_unordered(self.config.parallelism)
            .collect::<Vec<_>>();

        let completed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(batches = batch_count, "aggregate call cancelled");
                return Err(AggregateError::Cancelled);
            }
            done = dispatch => done,
        };

        // 5. reassemble by (batch, position)
        let mut first_ok: Option<(usize, BlockHeight)> = None;
        let mut failed_batches = 0usize;
        for (batch, result) in completed {
            let indices = &members[batch];
            match result {
                Ok(BatchResult {
                    block_number,
                    results,
                }) => {
                    if first_ok.map_or(true, |(b, _)| batch < b) {
                        first_ok = Some((batch, block_number));
                    }
                    for (&index, raw) in indices.iter().zip(results) {
                        outcomes[index] = Some(CallOutcome::Returned(raw));
                    }
                }
                Err(e) => {
                    failed_batches += 1;
                    let kind = if e.is_stale_block() {
                        FailureKind::StaleBlock
                    } else {
                        FailureKind::Transport
                    };
                    warn!(
                        batch,
                        calls = indices.len(),
                        backend = self.transport.name(),
                        error = %e,
                        "batch failed"
                    );
                    for &index in indices {
                        outcomes[index] =
                            Some(CallOutcome::Failed(CallFailure::new(kind, e.to_string())));
                    }
                }
            }
        }

        let block_number = first_ok.map(|(_, b)| b).or(pinned).unwrap_or(0);
        info!(
            calls = requests.len(),
            batches = batch_count,
            failed_batches,
            block = block_number,
            backend = self.transport.name(),
            "aggregate call complete"
        );

        Ok(BatchRun {
            block_number,
            outcomes: finish(outcomes),
            batches: batch_count,
        })
    }

    async fn head(&self, cancel: &CancellationToken) -> Result<BlockHeight, AggregateError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AggregateError::Cancelled),
            head = self.transport.block_number() => Ok(head?),
        }
    }
}

/// A batch answered at any other height than the pinned one is stale,
/// whatever the backend claims to guarantee.
fn check_block(
    result: BatchResult,
    pinned: Option<BlockHeight>,
) -> Result<BatchResult, TransportError> {
    match pinned {
        Some(requested) if result.block_number != requested => Err(TransportError::StaleBlock {
            requested,
            returned: Some(result.block_number),
        }),
        _ => Ok(result),
    }
}

fn check_len(result: BatchResult, expected: usize) -> Result<BatchResult, TransportError> {
    if result.results.len() != expected {
        return Err(TransportError::LengthMismatch {
            expected,
            got: result.results.len(),
        });
    }
    Ok(result)
}

fn finish(outcomes: Vec<Option<CallOutcome>>) -> Vec<CallOutcome> {
    outcomes
        .into_iter()
        .map(|o| {
            o.unwrap_or_else(|| {
                CallOutcome::Failed(CallFailure::new(
                    FailureKind::Transport,
                    "no result recorded",
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};

    fn call(len: usize) -> EncodedCall {
        EncodedCall {
            target: Address::ZERO,
            data: Bytes::from(vec![0u8; len]),
        }
    }

    fn indexed(lens: &[usize]) -> Vec<(usize, EncodedCall)> {
        lens.iter().enumerate().map(|(i, &l)| (i, call(l))).collect()
    }

    #[test]
    fn everything_fits_in_one_batch() {
        let (batches, oversized) = plan_batches(indexed(&[36, 36, 36]), 100_000, None);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].indices, [0, 1, 2]);
        assert_eq!(batches[0].size, 100 + 3 * (128 + 64));
        assert!(oversized.is_empty());
    }

    #[test]
    fn ceiling_splits_greedily() {
        // each call is 192 bytes; 100 + 2 * 192 = 484
        let (batches, _) = plan_batches(indexed(&[36; 5]), 484, None);
        let sizes: Vec<_> = batches.iter().map(|b| b.indices.len()).collect();
        assert_eq!(sizes, [2, 2, 1]);
        let flat: Vec<_> = batches.iter().flat_map(|b| b.indices.clone()).collect();
        assert_eq!(flat, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn oversized_call_is_excluded_and_packing_continues() {
        let (batches, oversized) = plan_batches(indexed(&[36, 10_000, 36]), 1_000, None);
        assert_eq!(oversized, vec![(1, 128 + 10_016)]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].indices, [0, 2]);
    }

    #[test]
    fn call_count_cap() {
        let (batches, _) = plan_batches(indexed(&[4; 7]), 100_000, Some(3));
        let sizes: Vec<_> = batches.iter().map(|b| b.indices.len()).collect();
        assert_eq!(sizes, [3, 3, 1]);
    }

    #[test]
    fn exact_fit_stays_in_batch() {
        let (batches, oversized) = plan_batches(indexed(&[0]), 228, None);
        assert_eq!(batches.len(), 1);
        assert!(oversized.is_empty());
        let (_, oversized) = plan_batches(indexed(&[1]), 228, None);
        assert_eq!(oversized.len(), 1);
    }
}
