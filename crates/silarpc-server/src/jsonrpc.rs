//! JSON-RPC 2.0 envelope
//!
//! The server speaks JSON-RPC 2.0 over HTTP. Methods are
//! `"{FeatureIdentifier}/{CallIdentifier}"` paths (plus `/Status`,
//! `/Intermediate`, `/Result` suffixes for observable command executions);
//! params carry a `parameters` object and an optional `metadata` map keyed
//! by fully qualified metadata identifiers.
//!
//! Standard JSON-RPC 2.0 error codes are used:
//! - `-32700`: Parse error
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//! - `-32000`: Server error (execution errors, interceptor denials)

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Call path, e.g. `"SiLAService/GetFeatureDefinition"`
    pub method: String,
    /// Call envelope: `{"parameters": …, "metadata": …}`
    #[serde(default)]
    pub params: Value,
    /// Request identifier (number, string, or null)
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SERVER_ERROR: i32 = -32000;

impl JsonRpcError {
    pub fn parse_error() -> Self {
        Self {
            code: PARSE_ERROR,
            message: "Parse error".into(),
            data: None,
        }
    }

    pub fn invalid_request(msg: &str) -> Self {
        Self {
            code: INVALID_REQUEST,
            message: msg.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(msg: &str) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: msg.into(),
            data: None,
        }
    }

    pub fn internal_error(msg: &str) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: msg.into(),
            data: None,
        }
    }

    pub fn server_error(msg: &str) -> Self {
        Self {
            code: SERVER_ERROR,
            message: msg.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_round_trip() {
        let req = JsonRpcRequest::new(
            "SiLAService/GetFeatureDefinition",
            json!({"parameters": {"FeatureIdentifier": "x"}}),
            json!(7),
        );
        let text = serde_json::to_string(&req).unwrap();
        let back: JsonRpcRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back.jsonrpc, "2.0");
        assert_eq!(back.method, "SiLAService/GetFeatureDefinition");
        assert_eq!(back.id, json!(7));
    }

    #[test]
    fn test_params_default_to_null() {
        let back: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"m","id":1}"#).unwrap();
        assert_eq!(back.params, Value::Null);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcError::parse_error().code, -32700);
        assert_eq!(JsonRpcError::method_not_found("x").code, -32601);
        assert_eq!(JsonRpcError::invalid_params("x").code, -32602);
        assert_eq!(JsonRpcError::internal_error("x").code, -32603);
        assert_eq!(JsonRpcError::server_error("x").code, -32000);
    }

    #[test]
    fn test_response_exclusivity() {
        let ok = JsonRpcResponse::success(json!(1), json!({"v": 1}));
        assert!(ok.result.is_some() && ok.error.is_none());
        let err = JsonRpcResponse::error(json!(1), JsonRpcError::server_error("boom"));
        assert!(err.result.is_none() && err.error.is_some());
    }
}
