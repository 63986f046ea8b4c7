//! The ABI codec seam.

use alloy_json_abi::JsonAbi;
use alloy_primitives::Bytes;

use crate::error::{DecodingError, EncodingError};
use crate::value::Value;

/// Encodes method calls and decodes their return data against an ABI.
///
/// Implementations are pure: no I/O, no state between calls.
pub trait Codec: Send + Sync + 'static {
    /// `selector ++ abi_encode(args)` for `method`.
    fn encode(&self, abi: &JsonAbi, method: &str, args: &[Value]) -> Result<Bytes, EncodingError>;

    /// Decode the return data of `method`.
    fn decode(&self, abi: &JsonAbi, method: &str, raw: &[u8]) -> Result<Vec<Value>, DecodingError>;

    /// Human-readable reason for a revert payload, when recognizable.
    /// `abi` is the called contract's ABI, for custom errors.
    fn describe_revert(&self, _abi: &JsonAbi, _data: &[u8]) -> Option<String> {
        None
    }
}
