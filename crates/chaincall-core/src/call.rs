//! Call requests, batch results and the aggregate response.
//!
//! The authoring unit is a [`ContractCallGroup`]: one contract, one ABI, many
//! [`MethodCall`]s. The engine flattens groups into [`CallRequest`]s, encodes
//! each into an [`EncodedCall`], and produces exactly one [`CallReturn`] per
//! request, in the flattened order.

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Block height as reported by the chain.
pub type BlockHeight = u64;

/// A single method invocation inside a [`ContractCallGroup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCall {
    /// Caller-chosen correlation key, copied verbatim into the result.
    pub reference: String,
    /// Bare method name (`balanceOf`) or full signature (`balanceOf(address)`).
    pub method_name: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
    /// Opaque caller payload, copied verbatim into the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl MethodCall {
    pub fn new(
        reference: impl Into<String>,
        method_name: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            reference: reference.into(),
            method_name: method_name.into(),
            arguments,
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Calls against one contract, grouped for authoring convenience only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallGroup {
    pub reference: String,
    pub contract_address: Address,
    pub abi: Arc<JsonAbi>,
    pub calls: Vec<MethodCall>,
}

impl ContractCallGroup {
    pub fn new(reference: impl Into<String>, contract_address: Address, abi: Arc<JsonAbi>) -> Self {
        Self {
            reference: reference.into(),
            contract_address,
            abi,
            calls: Vec::new(),
        }
    }

    /// Append a call (builder style).
    pub fn call(mut self, call: MethodCall) -> Self {
        self.calls.push(call);
        self
    }

    /// Flatten a list of groups into requests, preserving order.
    pub fn flatten(groups: Vec<ContractCallGroup>) -> Vec<CallRequest> {
        let total = groups.iter().map(|g| g.calls.len()).sum();
        let mut out = Vec::with_capacity(total);
        for group in groups {
            for call in group.calls {
                out.push(CallRequest {
                    reference: call.reference,
                    contract_reference: group.reference.clone(),
                    contract_address: group.contract_address,
                    abi: Arc::clone(&group.abi),
                    method_name: call.method_name,
                    arguments: call.arguments,
                    context: call.context,
                });
            }
        }
        out
    }
}

/// One flattened, immutable call request.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub reference: String,
    pub contract_reference: String,
    pub contract_address: Address,
    pub abi: Arc<JsonAbi>,
    pub method_name: String,
    pub arguments: Vec<Value>,
    pub context: Option<serde_json::Value>,
}

/// Wire-ready call: target contract plus call-data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedCall {
    pub target: Address,
    pub data: Bytes,
}

impl EncodedCall {
    /// Bytes of the `tryBlockAndAggregate` envelope: selector, the
    /// `requireSuccess` flag, the array offset and the array length.
    pub const ENVELOPE_SIZE: usize = 4 + 32 * 3;

    /// ABI-encoded size of this call as one `(address,bytes)` array element:
    /// element offset, address word, bytes offset, bytes length, padded data.
    pub fn estimated_size(&self) -> usize {
        32 * 4 + self.data.len().div_ceil(32) * 32
    }
}

/// Raw outcome of one call inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallResult {
    pub success: bool,
    /// Return data, or the revert payload when `success` is false.
    pub return_data: Bytes,
}

impl RawCallResult {
    pub fn ok(data: impl Into<Bytes>) -> Self {
        Self { success: true, return_data: data.into() }
    }

    pub fn reverted(data: impl Into<Bytes>) -> Self {
        Self { success: false, return_data: data.into() }
    }
}

/// Result of one transport send. `results[i]` belongs to the i-th submitted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub block_number: BlockHeight,
    pub results: Vec<RawCallResult>,
}

/// Why a call produced no decoded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Encoding,
    Oversized,
    Reverted,
    Decoding,
    Transport,
    StaleBlock,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Encoding => "encoding",
            Self::Oversized => "oversized",
            Self::Reverted => "reverted",
            Self::Decoding => "decoding",
            Self::Transport => "transport",
            Self::StaleBlock => "stale-block",
        };
        f.write_str(s)
    }
}

/// Per-call failure attached to a [`CallReturn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CallFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Outcome of one call, produced one-to-one from each [`CallRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReturn {
    pub reference: String,
    pub contract_reference: String,
    pub method_name: String,
    pub decoded: bool,
    pub return_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_error: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CallFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl CallReturn {
    /// A successfully decoded call.
    pub fn success(req: &CallRequest, return_values: Vec<Value>) -> Self {
        Self {
            reference: req.reference.clone(),
            contract_reference: req.contract_reference.clone(),
            method_name: req.method_name.clone(),
            decoded: true,
            return_values,
            raw_error: None,
            error: None,
            context: req.context.clone(),
        }
    }

    /// A call that produced no values.
    pub fn failure(req: &CallRequest, error: CallFailure, raw_error: Option<Bytes>) -> Self {
        Self {
            reference: req.reference.clone(),
            contract_reference: req.contract_reference.clone(),
            method_name: req.method_name.clone(),
            decoded: false,
            return_values: Vec::new(),
            raw_error,
            error: Some(error),
            context: req.context.clone(),
        }
    }
}

/// Final response of one aggregate call, in flattened input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub block_number: BlockHeight,
    pub results: Vec<CallReturn>,
}

impl AggregateResponse {
    /// Number of calls that decoded successfully.
    pub fn decoded_count(&self) -> usize {
        self.results.iter().filter(|r| r.decoded).count()
    }

    /// Look up a result by its call reference.
    pub fn get(&self, reference: &str) -> Option<&CallReturn> {
        self.results.iter().find(|r| r.reference == reference)
    }
}
