//! The RPC wire shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use infogrid_broker::QueryArgs;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;

/// One remote `get` request: the key plus its arguments. There is only one
/// remote-access method, so sending the query parameters is sufficient —
/// no command pattern needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub key: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl QueryRequest {
    pub fn new(key: &str, args: QueryArgs) -> Self {
        Self {
            key: key.to_string(),
            args: args.args,
            kwargs: args.kwargs,
        }
    }

    /// The argument bundle for the local provider call.
    pub fn query_args(&self) -> QueryArgs {
        QueryArgs {
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
        }
    }
}

/// The response to a [`QueryRequest`]: an HTTP-flavored status code with
/// either the payload or the error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn ok(payload: Value) -> Self {
        Self {
            status_code: STATUS_OK,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(status_code: u16, message: String) -> Self {
        Self {
            status_code,
            payload: None,
            error: Some(message),
        }
    }
}
