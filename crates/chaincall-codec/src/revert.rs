//! Revert payload decoding.
//!
//! Three shapes are recognized:
//! - `Error(string)`  selector `0x08c379a0`, emitted by `require` / `revert("..")`
//! - `Panic(uint256)` selector `0x4e487b71`, emitted by `assert` and checked arithmetic
//! - custom errors declared in the contract ABI (Solidity 0.8.4+)

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::JsonAbi;

use crate::convert::from_dyn_value;

/// The 4-byte selector for `Error(string)`.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// The 4-byte selector for `Panic(uint256)`.
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Decode an `Error(string)` payload into its message.
pub fn decode_error_string(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    match DynSolType::Tuple(vec![DynSolType::String]).abi_decode_params(payload) {
        Ok(DynSolValue::Tuple(mut vals)) => match vals.pop() {
            Some(DynSolValue::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Decode a `Panic(uint256)` payload into `(code, meaning)`.
pub fn decode_panic(data: &[u8]) -> Option<(u64, &'static str)> {
    let payload = data.strip_prefix(&PANIC_SELECTOR[..])?;
    match DynSolType::Tuple(vec![DynSolType::Uint(256)]).abi_decode_params(payload) {
        Ok(DynSolValue::Tuple(mut vals)) => match vals.pop() {
            Some(DynSolValue::Uint(v, _)) => {
                let code = u64::try_from(v).unwrap_or(u64::MAX);
                Some((code, panic_meaning(code)))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Map a Solidity panic code to a human-readable description.
pub fn panic_meaning(code: u64) -> &'static str {
    match code {
        0x00 => "generic compiler-inserted panic",
        0x01 => "assert() called with false condition",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "corrupted storage byte array",
        0x31 => ".pop() on empty array",
        0x32 => "out-of-bounds array access",
        0x41 => "too much memory allocated",
        0x51 => "called zero-initialized internal function pointer",
        _ => "unknown panic code",
    }
}

/// Decode a custom error declared in `abi`, rendered as `Name(arg, ..)`.
pub fn decode_custom_error(abi: &JsonAbi, data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let (selector, payload) = data.split_at(4);
    // Selector collisions are possible; take the first error that decodes.
    abi.errors()
        .filter(|e| e.selector().as_slice() == selector)
        .find_map(|err| {
            let types = err
                .inputs
                .iter()
                .map(|p| p.resolve().ok())
                .collect::<Option<Vec<_>>>()?;
            let args = match DynSolType::Tuple(types).abi_decode_params(payload).ok()? {
                DynSolValue::Tuple(vals) => vals,
                single => vec![single],
            };
            let rendered: Vec<String> = args
                .into_iter()
                .map(|v| from_dyn_value(v).to_string())
                .collect();
            Some(format!("{}({})", err.name, rendered.join(", ")))
        })
}

/// Best-effort description of a revert payload.
pub fn describe(abi: &JsonAbi, data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    if let Some(msg) = decode_error_string(data) {
        return Some(format!("execution reverted: {msg}"));
    }
    if let Some((code, meaning)) = decode_panic(data) {
        return Some(format!("panic 0x{code:02x}: {meaning}"));
    }
    decode_custom_error(abi, data).map(|e| format!("custom error {e}"))
}
