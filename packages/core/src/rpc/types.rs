//! JSON-RPC 2.0 Wire Types
//!
//! Request/response/error structures shared by the endpoint server loop and
//! the client-side remote handle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request structure
///
/// # Example
///
/// ```json
/// {
///     "jsonrpc": "2.0",
///     "id": 7,
///     "method": "createFixtureInstance",
///     "params": { "spec": "task" }
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,

    /// Request identifier (used to match responses)
    pub id: u64,

    /// Method name to invoke on the published object
    pub method: String,

    /// Method arguments as JSON value
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Create a request for the given method and arguments
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response structure
///
/// Exactly one of `result` and `error` is present.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request identifier (matches request)
    pub id: u64,

    /// Success result (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error information (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error structure
///
/// Remote failures travel as a code plus serialized description, never as
/// the original error type.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code (standard JSON-RPC or harness-specific)
    pub code: i32,

    /// Human-readable error message
    pub message: String,
}

// JSON-RPC 2.0 standard error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Harness-specific error codes (application errors: -32000 to -32099)
pub const UNBALANCED_TRANSACTION: i32 = -32000;
pub const TRANSACTION_FAILED: i32 = -32001;
pub const UNKNOWN_FIXTURE: i32 = -32002;
pub const FIXTURE_FAILED: i32 = -32003;

impl RpcError {
    /// Create a parse error
    pub fn parse_error(message: String) -> Self {
        Self {
            code: PARSE_ERROR,
            message,
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: String) -> Self {
        Self {
            code: INVALID_REQUEST,
            message,
        }
    }

    /// Create a method not found error
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", method),
        }
    }

    /// Create an invalid params error
    pub fn invalid_params(message: String) -> Self {
        Self {
            code: INVALID_PARAMS,
            message,
        }
    }

    /// Create an internal error
    pub fn internal_error(message: String) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message,
        }
    }

    /// Create an unbalanced transaction error
    pub fn unbalanced_transaction() -> Self {
        Self {
            code: UNBALANCED_TRANSACTION,
            message: "Rollback requested with no open transaction".to_string(),
        }
    }

    /// Create a transaction failed error
    pub fn transaction_failed(message: String) -> Self {
        Self {
            code: TRANSACTION_FAILED,
            message,
        }
    }

    /// Create an unknown fixture error
    pub fn unknown_fixture(spec: &str) -> Self {
        Self {
            code: UNKNOWN_FIXTURE,
            message: format!("Unknown fixture specification: {}", spec),
        }
    }

    /// Create a fixture failed error
    pub fn fixture_failed(message: String) -> Self {
        Self {
            code: FIXTURE_FAILED,
            message,
        }
    }
}

impl RpcResponse {
    /// Create a success response
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: u64, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
