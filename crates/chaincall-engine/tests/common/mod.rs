//! In-process chain used by the engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use chaincall_codec::AbiCodec;
use chaincall_core::{
    BatchResult, BatchTransport, BlockHeight, Codec, EncodedCall, RawCallResult, TransportError,
    Value,
};

pub const ERC20_ABI: &str = r#"[
    {"type":"function","name":"balanceOf","stateMutability":"view",
     "inputs":[{"name":"owner","type":"address"}],
     "outputs":[{"name":"","type":"uint256"}]},
    {"type":"function","name":"echo","stateMutability":"view",
     "inputs":[{"name":"blob","type":"bytes"}],
     "outputs":[{"name":"","type":"bytes"}]}
]"#;

pub fn erc20() -> Arc<JsonAbi> {
    Arc::new(serde_json::from_str(ERC20_ABI).unwrap())
}

pub fn holder(n: u8) -> Address {
    Address::with_last_byte(n)
}

pub fn token() -> Address {
    Address::repeat_byte(0xaa)
}

/// Call-data of `balanceOf(holder(n))`.
pub fn balance_call(n: u8) -> Bytes {
    AbiCodec
        .encode(&erc20(), "balanceOf", &[Value::Address(holder(n))])
        .unwrap()
}

pub fn word(v: u64) -> Bytes {
    Bytes::from(U256::from(v).to_be_bytes::<32>().to_vec())
}

type DelayFn = Box<dyn Fn(&[EncodedCall]) -> Duration + Send + Sync>;
type FailFn = Box<dyn Fn(&[EncodedCall], Option<BlockHeight>) -> Option<TransportError> + Send + Sync>;

/// Answers calls from a table keyed by call-data; unknown calls return a
/// zero word. Every send is recorded.
pub struct MockChain {
    pub head: BlockHeight,
    answers: HashMap<Bytes, RawCallResult>,
    delay: Option<DelayFn>,
    fail: Option<FailFn>,
    head_fails: bool,
    drifting: bool,
    pub sends: AtomicUsize,
    pub head_requests: AtomicUsize,
    pub seen_blocks: Mutex<Vec<Option<BlockHeight>>>,
}

impl MockChain {
    pub fn new(head: BlockHeight) -> Self {
        Self {
            head,
            answers: HashMap::new(),
            delay: None,
            fail: None,
            head_fails: false,
            drifting: false,
            sends: AtomicUsize::new(0),
            head_requests: AtomicUsize::new(0),
            seen_blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, data: Bytes, result: RawCallResult) -> Self {
        self.answers.insert(data, result);
        self
    }

    pub fn delay(mut self, f: impl Fn(&[EncodedCall]) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(f));
        self
    }

    pub fn fail(
        mut self,
        f: impl Fn(&[EncodedCall], Option<BlockHeight>) -> Option<TransportError> + Send + Sync + 'static,
    ) -> Self {
        self.fail = Some(Box::new(f));
        self
    }

    pub fn head_fails(mut self) -> Self {
        self.head_fails = true;
        self
    }

    /// Ignore the requested block and answer each send one block later
    /// than the previous one, starting at `head + 1`.
    pub fn drifting(mut self) -> Self {
        self.drifting = true;
        self
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn head_requests(&self) -> usize {
        self.head_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchTransport for MockChain {
    async fn send(
        &self,
        calls: &[EncodedCall],
        at_block: Option<BlockHeight>,
    ) -> Result<BatchResult, TransportError> {
        let send = self.sends.fetch_add(1, Ordering::SeqCst) as BlockHeight;
        self.seen_blocks.lock().unwrap().push(at_block);
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(calls)).await;
        }
        if let Some(fail) = &self.fail {
            if let Some(err) = fail(calls, at_block) {
                return Err(err);
            }
        }
        let results = calls
            .iter()
            .map(|c| {
                self.answers
                    .get(&c.data)
                    .cloned()
                    .unwrap_or_else(|| RawCallResult::ok(word(0)))
            })
            .collect();
        Ok(BatchResult {
            block_number: if self.drifting {
                self.head + send + 1
            } else {
                at_block.unwrap_or(self.head)
            },
            results,
        })
    }

    async fn block_number(&self) -> Result<BlockHeight, TransportError> {
        self.head_requests.fetch_add(1, Ordering::SeqCst);
        if self.head_fails {
            return Err(TransportError::Http("connection refused".into()));
        }
        Ok(self.head)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
