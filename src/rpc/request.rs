//! JSON-RPC 2.0 envelope types.
//!
//! Only the envelope is modeled: `params`, `result` and error `data` stay as
//! raw [`serde_json::Value`]s for the caller to interpret.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`
    pub jsonrpc: String,
    /// Method name, e.g. `eth_blockNumber`
    pub method: String,
    /// Positional or named parameters
    pub params: Value,
    /// Request id echoed back by the node
    pub id: u64,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version
    #[serde(default)]
    pub jsonrpc: String,
    /// Id of the request this answers; `null` for some parse errors
    #[serde(default)]
    pub id: Value,
    /// Result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Numeric id of the request this response answers, if any.
    #[must_use]
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_u64()
    }

    /// Unwrap the result value or convert the error object.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Rpc`] when the node returned an error object.
    pub fn into_result(self) -> Result<Value, ProviderError> {
        match self.error {
            Some(err) => Err(ProviderError::rpc(err.code, err.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
