//! JSON-RPC 2.0 envelope types and failure codes (§4.1 "Failure
//! semantics", §6 "MCP JSON-RPC surface"). Hand-rolled rather than
//! pulled from a JSON-RPC crate, for the same reason `pml-mcp`'s
//! framing is hand-rolled (§4.2): this dialect is MCP-specific
//! (arbitrary `method`/`params` shapes, not a fixed service trait), and
//! the wire contract itself is in-scope engineering per the spec.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes this gateway emits (§4.1, §7).
pub mod codes {
    /// Malformed JSON (§4.1 "malformed JSON → -32700").
    pub const PARSE_ERROR: i64 = -32700;
    /// Unknown method (§4.1 "unknown method → -32601").
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params (§4.1 "invalid params → -32602").
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error (§4.1 "internal → -32603").
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Backpressure: the bounded queue is full (§4.1, §5, §7).
    pub const BACKPRESSURE: i64 = -32000;
}

/// One incoming JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// The request id; notifications omit it.
    #[serde(default)]
    pub id: Option<Value>,
    /// The method name (`initialize`, `tools/list`, `tools/call`, …).
    pub method: String,
    /// Method parameters, if any.
    #[serde(default)]
    pub params: Value,
}

/// One outgoing JSON-RPC 2.0 response, either a result or an error.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    /// Echoes the original request's id.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl RpcResponse {
    /// A successful response carrying `result`.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// An error response with no extra data.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    /// An error response carrying structured `data`.
    #[must_use]
    pub fn error_with_data(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    /// Whether this response carries an error body.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Parse raw request bytes into an [`RpcRequest`], or build the
/// `-32700` response directly if they are not valid JSON-RPC (§4.1).
///
/// # Errors
///
/// Returns the ready-to-send [`RpcResponse`] (not a [`RpcRequest`]) on
/// parse failure, since no request id can be recovered from malformed
/// input — the response's `id` is `null` per JSON-RPC 2.0 convention.
pub fn parse_request(bytes: &[u8]) -> Result<RpcRequest, RpcResponse> {
    serde_json::from_slice(bytes).map_err(|e| RpcResponse::error(Value::Null, codes::PARSE_ERROR, format!("parse error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_yields_parse_error_with_null_id() {
        let result = parse_request(b"{not json");
        let response = result.expect_err("malformed input is rejected");
        assert!(response.is_error());
        assert_eq!(response.id, Value::Null);
    }

    #[test]
    fn well_formed_request_parses() {
        let request = parse_request(br#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#)
            .expect("valid request parses");
        assert_eq!(request.method, "tools/list");
    }

    #[test]
    fn success_response_serializes_without_error_field() {
        let response = RpcResponse::success(Value::from(1), serde_json::json!({"ok": true}));
        let value = serde_json::to_value(&response).expect("serializable");
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["ok"], true);
    }
}
