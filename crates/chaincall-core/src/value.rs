//! Tagged ABI value type.
//!
//! Every argument handed to the codec and every decoded return value is a
//! [`Value`]. Integers keep their full 256-bit width; nothing goes through a
//! lossy generic representation.

use alloy_primitives::{Address, Bytes, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single ABI value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    /// Unsigned integer of any width up to 256 bits
    Uint(U256),
    /// Signed integer of any width up to 256 bits
    Int(I256),
    Address(Address),
    /// Dynamic `bytes`
    Bytes(Bytes),
    /// `bytes1` .. `bytes32`, stored at their declared length
    FixedBytes(Bytes),
    Str(String),
    /// Dynamic or fixed-size array
    Array(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    /// Shorthand for a `Uint` from a native integer.
    pub fn uint(v: u128) -> Self {
        Value::Uint(U256::from(v))
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Name of the variant, used in type-mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Uint(_) => "uint",
            Value::Int(_) => "int",
            Value::Address(_) => "address",
            Value::Bytes(_) => "bytes",
            Value::FixedBytes(_) => "fixedbytes",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<U256> for Value {
    fn from(v: U256) -> Self {
        Value::Uint(v)
    }
}

impl From<I256> for Value {
    fn from(v: I256) -> Self {
        Value::Int(v)
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Value::Address(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Address(a) => write!(f, "{a}"),
            Value::Bytes(b) | Value::FixedBytes(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Tuple(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}
