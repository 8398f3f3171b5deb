//! RPC wire-format types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RpcError;

/// Caller-supplied request identity: a non-empty string or a JSON number.
///
/// Opaque to the gateway; it is echoed back verbatim and never rewritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identity (preserved exactly, including floats).
    Num(serde_json::Number),
    /// String identity.
    Str(String),
}

impl RequestId {
    /// Extract a valid identity from a decoded JSON value.
    ///
    /// Returns `None` for anything other than a number or non-empty string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::Str(s.clone())),
            Value::Number(n) => Some(Self::Num(n.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Num(n.into())
    }
}

/// A validated inbound RPC request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    /// Request identity, echoed in the response.
    pub id: RequestId,
    /// Method name (e.g. `getFlightByIdent`).
    pub method: String,
    /// Parameters object; absent on the wire means empty.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

/// Structured error inside a failure [`Response`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Protocol or handler error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// An outbound RPC response: either `result` or `error`, never both.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    /// Echoed request identity; `null` when none could be recovered.
    #[serde(default)]
    pub id: Option<RequestId>,
    /// Handler output, opaque to the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// Build a success response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Build a failure response.
    pub fn failure(id: Option<RequestId>, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// Build a failure response from a handler error.
    pub fn from_error(id: RequestId, err: &RpcError) -> Self {
        Self {
            id: Some(id),
            result: None,
            error: Some(err.to_error_body()),
        }
    }
}
