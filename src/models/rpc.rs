//! JSON-RPC 2.0 and legacy request/response shapes.
//!
//! The dispatcher classifies each POST body by the presence of the
//! `jsonrpc: "2.0"` protocol marker. Bodies without it are treated as
//! legacy flat calls (`{function_name, parameters}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The protocol-version literal that selects the JSON-RPC flavor.
pub const JSONRPC_VERSION: &str = "2.0";

/// An inbound JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Request identifier, echoed in the response. Notifications omit it.
    #[serde(default)]
    pub id: Option<Value>,

    /// Method name (e.g., `initialize`, `tools/list`, `executeFunction`).
    /// Defaulted when absent so a malformed envelope still routes to the
    /// method-not-found arm with its id intact.
    #[serde(default)]
    pub method: String,

    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Parameters of an `executeFunction` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteFunctionParams {
    /// Name of the function to execute.
    #[serde(default)]
    pub name: Option<String>,

    /// Arguments for the function.
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// An inbound legacy flat request.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyRequest {
    /// Name of the function to execute.
    #[serde(default)]
    pub function_name: Option<String>,

    /// Arguments for the function.
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// JSON-RPC error code.
    pub code: i64,

    /// Human-readable error message.
    pub message: String,
}

/// An outbound JSON-RPC 2.0 response envelope.
///
/// Constructed per request and discarded after the response is sent;
/// no state crosses requests.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Echo of the request id. Serialized as `null` when the request
    /// carried none, omitted entirely for bare acknowledgements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Builds a success response echoing the request id.
    pub fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id.unwrap_or(Value::Null)),
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response echoing the request id (or null).
    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id.unwrap_or(Value::Null)),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Builds the bare acknowledgement sent for one-way notifications.
    pub fn ack() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            result: None,
            error: None,
        }
    }
}
