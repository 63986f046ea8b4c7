//! `AbiCodec` — the default [`Codec`] backed by alloy's dynamic ABI.
//!
//! # Usage
//! ```ignore
//! let abi: JsonAbi = serde_json::from_str(ERC20_ABI)?;
//! let data = AbiCodec.encode(&abi, "balanceOf", &[Value::Address(holder)])?;
//! let out  = AbiCodec.decode(&abi, "balanceOf", &return_bytes)?;
//! ```

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Function, JsonAbi, Param};
use alloy_primitives::Bytes;
use chaincall_core::{Codec, DecodingError, EncodingError, Value};

use crate::convert::{from_dyn_value, head_size, to_dyn_value};
use crate::revert;

/// Stateless ABI codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbiCodec;

/// Find `method` in `abi`.
///
/// A `method` containing `(` is matched against the full signature
/// (`transfer(address,uint256)`), otherwise the first function with that
/// name wins.
pub fn find_function<'a>(abi: &'a JsonAbi, method: &str) -> Option<&'a Function> {
    if method.contains('(') {
        let wanted: String = method.chars().filter(|c| !c.is_whitespace()).collect();
        abi.functions().find(|f| f.signature() == wanted)
    } else {
        abi.functions().find(|f| f.name == method)
    }
}

fn resolve_all(params: &[Param]) -> Result<Vec<DynSolType>, String> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| p.resolve().map_err(|e| format!("param {i}: {e}")))
        .collect()
}

impl Codec for AbiCodec {
    fn encode(&self, abi: &JsonAbi, method: &str, args: &[Value]) -> Result<Bytes, EncodingError> {
        let func = find_function(abi, method).ok_or_else(|| EncodingError::MethodNotFound {
            method: method.to_string(),
        })?;

        if args.len() != func.inputs.len() {
            return Err(EncodingError::ArgumentCount {
                method: method.to_string(),
                expected: func.inputs.len(),
                got: args.len(),
            });
        }

        let types = resolve_all(&func.inputs).map_err(EncodingError::InvalidAbi)?;
        let mut values = Vec::with_capacity(args.len());
        for (index, (arg, ty)) in args.iter().zip(types.iter()).enumerate() {
            let value = to_dyn_value(arg, ty).map_err(|reason| EncodingError::TypeMismatch {
                method: method.to_string(),
                index,
                reason,
            })?;
            values.push(value);
        }

        let mut calldata = func.selector().to_vec();
        calldata.extend_from_slice(&DynSolValue::Tuple(values).abi_encode_params());
        Ok(calldata.into())
    }

    fn decode(&self, abi: &JsonAbi, method: &str, raw: &[u8]) -> Result<Vec<Value>, DecodingError> {
        let func = find_function(abi, method).ok_or_else(|| DecodingError::MethodNotFound {
            method: method.to_string(),
        })?;

        if raw.is_empty() {
            return Err(DecodingError::Empty {
                method: method.to_string(),
            });
        }
        if func.outputs.is_empty() {
            return Ok(Vec::new());
        }

        let types = resolve_all(&func.outputs).map_err(|reason| DecodingError::Malformed {
            method: method.to_string(),
            reason,
        })?;

        let min = head_size(&types);
        if raw.len() < min {
            return Err(DecodingError::TooShort {
                method: method.to_string(),
                min,
                got: raw.len(),
            });
        }

        let decoded = DynSolType::Tuple(types)
            .abi_decode_params(raw)
            .map_err(|e| DecodingError::Malformed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        Ok(match decoded {
            DynSolValue::Tuple(vals) => vals.into_iter().map(from_dyn_value).collect(),
            single => vec![from_dyn_value(single)],
        })
    }

    fn describe_revert(&self, abi: &JsonAbi, data: &[u8]) -> Option<String> {
        revert::describe(abi, data)
    }
}
