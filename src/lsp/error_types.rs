//! JSON-RPC error objects returned by the analysis server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes the client reacts to (JSON-RPC reserved and LSP 3.17)
pub struct ErrorCodes;

impl ErrorCodes {
    /// The method is not implemented by the server
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Request failed but was syntactically correct
    pub const REQUEST_FAILED: i32 = -32803;
}

/// Error member of a JSON-RPC response (LSP 3.x § Response Message)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    /// Extract the error member of a response message, if it has one.
    ///
    /// An error member that is not a well-formed error object is reported
    /// as REQUEST_FAILED carrying the raw value.
    pub fn from_response(response: &Value) -> Option<Self> {
        let error = response.get("error")?;
        Some(
            serde_json::from_value(error.clone()).unwrap_or_else(|_| Self {
                code: ErrorCodes::REQUEST_FAILED,
                message: error.to_string(),
                data: None,
            }),
        )
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code == ErrorCodes::METHOD_NOT_FOUND
    }
}
