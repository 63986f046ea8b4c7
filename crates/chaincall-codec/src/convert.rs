//! Conversion between [`Value`] and alloy's `DynSolValue`.
//!
//! Encoding direction is driven by the parameter's resolved `DynSolType`, so
//! every width and length constraint of the ABI is checked before encoding.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Bytes, Function, Sign, B256, I256, U256};
use chaincall_core::Value;

/// Convert `val` into the `DynSolValue` expected for `ty`.
///
/// Errors are plain messages; the caller attaches the method and position.
pub fn to_dyn_value(val: &Value, ty: &DynSolType) -> Result<DynSolValue, String> {
    match (val, ty) {
        (Value::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),

        (Value::Uint(v), DynSolType::Uint(bits)) => {
            if v.bit_len() > *bits {
                return Err(format!("value {v} does not fit in uint{bits}"));
            }
            Ok(DynSolValue::Uint(*v, *bits))
        }

        (Value::Int(v), DynSolType::Int(bits)) => {
            if !int_fits(*v, *bits) {
                return Err(format!("value {v} does not fit in int{bits}"));
            }
            Ok(DynSolValue::Int(*v, *bits))
        }

        // Non-negative literals are commonly written as uint
        (Value::Uint(v), DynSolType::Int(bits)) => {
            if v.bit_len() >= *bits {
                return Err(format!("value {v} does not fit in int{bits}"));
            }
            Ok(DynSolValue::Int(I256::from_raw(*v), *bits))
        }

        (Value::Address(a), DynSolType::Address) => Ok(DynSolValue::Address(*a)),

        (Value::Bytes(b), DynSolType::Bytes) => Ok(DynSolValue::Bytes(b.to_vec())),

        (Value::FixedBytes(b) | Value::Bytes(b), DynSolType::FixedBytes(n)) => {
            if b.len() > *n {
                return Err(format!("bytes{n}: got {} bytes", b.len()));
            }
            let mut word = B256::ZERO;
            word[..b.len()].copy_from_slice(b);
            Ok(DynSolValue::FixedBytes(word, *n))
        }

        (Value::FixedBytes(b) | Value::Bytes(b), DynSolType::Function) => {
            if b.len() != 24 {
                return Err(format!("function: expected 24 bytes, got {}", b.len()));
            }
            Ok(DynSolValue::Function(Function::from_slice(b)))
        }

        (Value::Str(s), DynSolType::String) => Ok(DynSolValue::String(s.clone())),

        (Value::Array(elems), DynSolType::Array(inner)) => {
            let converted: Result<Vec<_>, _> =
                elems.iter().map(|e| to_dyn_value(e, inner)).collect();
            Ok(DynSolValue::Array(converted?))
        }

        (Value::Array(elems), DynSolType::FixedArray(inner, len)) => {
            if elems.len() != *len {
                return Err(format!(
                    "fixed array length mismatch: expected {len}, got {}",
                    elems.len()
                ));
            }
            let converted: Result<Vec<_>, _> =
                elems.iter().map(|e| to_dyn_value(e, inner)).collect();
            Ok(DynSolValue::FixedArray(converted?))
        }

        (Value::Tuple(fields), DynSolType::Tuple(types)) => {
            if fields.len() != types.len() {
                return Err(format!(
                    "tuple arity mismatch: expected {}, got {}",
                    types.len(),
                    fields.len()
                ));
            }
            let converted: Result<Vec<_>, _> = fields
                .iter()
                .zip(types.iter())
                .map(|(v, t)| to_dyn_value(v, t))
                .collect();
            Ok(DynSolValue::Tuple(converted?))
        }

        _ => Err(format!(
            "cannot convert {} to {}",
            val.kind(),
            ty.sol_type_name()
        )),
    }
}

/// Convert a decoded `DynSolValue` into a [`Value`].
pub fn from_dyn_value(val: DynSolValue) -> Value {
    match val {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Int(i, _) => Value::Int(i),
        DynSolValue::Uint(u, _) => Value::Uint(u),
        DynSolValue::FixedBytes(word, size) => {
            Value::FixedBytes(Bytes::copy_from_slice(&word[..size]))
        }
        DynSolValue::Address(a) => Value::Address(a),
        DynSolValue::Function(f) => Value::FixedBytes(Bytes::copy_from_slice(f.as_slice())),
        DynSolValue::Bytes(b) => Value::Bytes(b.into()),
        DynSolValue::String(s) => Value::Str(s),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            Value::Array(vals.into_iter().map(from_dyn_value).collect())
        }
        DynSolValue::Tuple(fields) => Value::Tuple(fields.into_iter().map(from_dyn_value).collect()),
    }
}

/// Minimum number of bytes the head of `types` occupies when ABI-encoded
/// as a parameter list. Dynamic types contribute their 32-byte offset.
pub fn head_size(types: &[DynSolType]) -> usize {
    types.iter().map(static_size).sum()
}

fn static_size(ty: &DynSolType) -> usize {
    if is_dynamic(ty) {
        return 32;
    }
    match ty {
        DynSolType::FixedArray(inner, len) => static_size(inner) * len,
        DynSolType::Tuple(types) => head_size(types),
        _ => 32,
    }
}

/// `true` when `ty` is encoded out of line behind an offset.
fn is_dynamic(ty: &DynSolType) -> bool {
    match ty {
        DynSolType::Bytes | DynSolType::String | DynSolType::Array(_) => true,
        DynSolType::FixedArray(inner, _) => is_dynamic(inner),
        DynSolType::Tuple(types) => types.iter().any(is_dynamic),
        _ => false,
    }
}

/// `true` when `v` lies in the two's-complement range of `int<bits>`.
fn int_fits(v: I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let bound = U256::from(1u8) << (bits - 1);
    match v.into_sign_and_abs() {
        (Sign::Positive, abs) => abs < bound,
        (Sign::Negative, abs) => abs <= bound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn uint_width_is_enforced() {
        let ok = to_dyn_value(&Value::uint(255), &DynSolType::Uint(8)).unwrap();
        assert_eq!(ok, DynSolValue::Uint(U256::from(255), 8));
        let err = to_dyn_value(&Value::uint(256), &DynSolType::Uint(8)).unwrap_err();
        assert!(err.contains("uint8"));
    }

    #[test]
    fn int_range_is_enforced() {
        let min = I256::try_from(-128i64).unwrap();
        assert!(to_dyn_value(&Value::Int(min), &DynSolType::Int(8)).is_ok());
        let too_small = I256::try_from(-129i64).unwrap();
        assert!(to_dyn_value(&Value::Int(too_small), &DynSolType::Int(8)).is_err());
        let too_big = I256::try_from(128i64).unwrap();
        assert!(to_dyn_value(&Value::Int(too_big), &DynSolType::Int(8)).is_err());
    }

    #[test]
    fn uint_accepted_for_int_when_it_fits() {
        let v = to_dyn_value(&Value::uint(127), &DynSolType::Int(8)).unwrap();
        assert_eq!(v, DynSolValue::Int(I256::try_from(127i64).unwrap(), 8));
        assert!(to_dyn_value(&Value::uint(128), &DynSolType::Int(8)).is_err());
    }

    #[test]
    fn fixed_bytes_are_right_padded() {
        let v = to_dyn_value(
            &Value::FixedBytes(Bytes::from(vec![0xab, 0xcd])),
            &DynSolType::FixedBytes(4),
        )
        .unwrap();
        match v {
            DynSolValue::FixedBytes(word, 4) => {
                assert_eq!(&word[..4], &[0xab, 0xcd, 0, 0]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn oversize_fixed_bytes_rejected() {
        let err = to_dyn_value(
            &Value::FixedBytes(Bytes::from(vec![0u8; 5])),
            &DynSolType::FixedBytes(4),
        )
        .unwrap_err();
        assert!(err.contains("bytes4"));
    }

    #[test]
    fn fixed_array_length_checked() {
        let ty = DynSolType::FixedArray(Box::new(DynSolType::Bool), 2);
        assert!(to_dyn_value(&Value::Array(vec![Value::Bool(true)]), &ty).is_err());
        assert!(to_dyn_value(
            &Value::Array(vec![Value::Bool(true), Value::Bool(false)]),
            &ty
        )
        .is_ok());
    }

    #[test]
    fn type_mismatch_names_both_sides() {
        let err = to_dyn_value(&Value::Bool(true), &DynSolType::Address).unwrap_err();
        assert_eq!(err, "cannot convert bool to address");
    }

    #[test]
    fn nested_values_come_back_unchanged() {
        let holder = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        let original = Value::Tuple(vec![
            Value::Address(holder),
            Value::Array(vec![Value::uint(1), Value::uint(2)]),
            Value::Str("gm".into()),
        ]);
        let ty = DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Array(Box::new(DynSolType::Uint(256))),
            DynSolType::String,
        ]);
        let dyn_val = to_dyn_value(&original, &ty).unwrap();
        assert_eq!(from_dyn_value(dyn_val), original);
    }

    #[test]
    fn head_size_counts_dynamic_as_offset() {
        let types = vec![
            DynSolType::Uint(256),
            DynSolType::String,
            DynSolType::FixedArray(Box::new(DynSolType::Address), 3),
        ];
        assert_eq!(head_size(&types), 32 + 32 + 96);
    }

    #[test]
    fn nested_dynamic_types_take_one_word() {
        let types = vec![
            DynSolType::Tuple(vec![DynSolType::Uint(8), DynSolType::Bytes]),
            DynSolType::FixedArray(Box::new(DynSolType::String), 2),
            DynSolType::Array(Box::new(DynSolType::Uint(256))),
            DynSolType::Tuple(vec![DynSolType::Bool, DynSolType::Address]),
        ];
        assert_eq!(head_size(&types), 32 + 32 + 32 + 64);
    }
}
