//! Shared types for JSON-RPC request/response handling.

use serde::Serialize;

/// Method whose first param is a hex-encoded signed transaction.
pub const SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

/// Standard JSON-RPC 2.0 response, used for bodies the proxy itself produces.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    pub fn error(id: serde_json::Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }

    /// Internal-error reply for a flow whose upstream produced no response.
    pub fn upstream_unavailable(reason: &str) -> Self {
        Self::error(
            serde_json::Value::Null,
            -32603,
            format!("Upstream connection error: {reason}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_unavailable_serializes_without_result() {
        let resp = JsonRpcResponse::upstream_unavailable("connection refused");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"code\":-32603"));
        assert!(json.contains("\"id\":null"));
        assert!(!json.contains("\"result\""));
        assert!(!json.contains("\"data\""));
    }
}
