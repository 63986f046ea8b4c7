//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::BlockHeight;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// Block tag for `eth_call`: a pinned height or `"latest"`.
pub fn block_tag(at_block: Option<BlockHeight>) -> Value {
    match at_block {
        Some(n) => Value::String(format!("0x{n:x}")),
        None => Value::String("latest".into()),
    }
}

/// Parse a `0x`-prefixed hex quantity such as an `eth_blockNumber` result.
pub fn parse_quantity(v: &Value) -> Option<u64> {
    let s = v.as_str()?;
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok()
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// `true` for the node's "execution reverted" family of errors.
    pub fn is_revert(&self) -> bool {
        self.code == 3 || self.message.to_ascii_lowercase().contains("revert")
    }

    /// `true` when the node cannot serve the requested block state.
    pub fn is_block_unavailable(&self) -> bool {
        let msg = self.message.to_ascii_lowercase();
        ["header not found", "missing trie node", "unknown block", "block not found"]
            .iter()
            .any(|needle| msg.contains(needle))
    }

    /// Revert payload carried in `data`, if the node supplied one.
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        let s = self.data.as_ref()?.as_str()?;
        hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok()
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Returns `true` if this is a successful response (has result, no error).
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// Unwrap the result value or return the error object.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(1, "eth_blockNumber", vec![]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"eth_blockNumber\""));
    }

    #[test]
    fn block_tag_formats_hex() {
        assert_eq!(block_tag(Some(1000)), Value::String("0x3e8".into()));
        assert_eq!(block_tag(None), Value::String("latest".into()));
        assert_eq!(parse_quantity(&block_tag(Some(1000))), Some(1000));
    }

    #[test]
    fn response_into_result_error() {
        let resp = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: RpcId::Number(1),
            result: None,
            error: Some(JsonRpcError {
                code: 3,
                message: "execution reverted".into(),
                data: Some(Value::String("0x08c379a0".into())),
            }),
        };
        assert!(!resp.is_ok());
        let err = resp.into_result().unwrap_err();
        assert!(err.is_revert());
        assert_eq!(err.revert_data().unwrap(), vec![0x08, 0xc3, 0x79, 0xa0]);
    }

    #[test]
    fn block_unavailable_detection() {
        let err = JsonRpcError {
            code: -32000,
            message: "missing trie node abc (path )".into(),
            data: None,
        };
        assert!(err.is_block_unavailable());
        assert!(!err.is_revert());
    }
}
