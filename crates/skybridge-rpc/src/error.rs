//! Protocol error codes and the handler error type.

use skybridge_aeroapi::AeroApiError;

use crate::types::ErrorBody;

// ── Protocol-visible code taxonomy ──────────────────────────────────

/// Payload was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Request was missing `id` or `method` (or was not an object).
pub const INVALID_REQUEST: i64 = -32600;
/// No handler registered for the requested method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Handler did not complete within the configured deadline.
pub const REQUEST_TIMEOUT: i64 = -32001;
/// Handler-level parameter validation failure.
pub const INVALID_PARAMS: i64 = 400;
/// Unclassified handler or internal failure.
pub const INTERNAL_ERROR: i64 = 500;

/// Error returned by method handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Required parameter missing or of the wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Upstream failure carrying its own caller-meaningful code.
    #[error("{message}")]
    Upstream {
        /// Code reported by the upstream boundary (HTTP status, 503, -32001).
        code: i64,
        /// Human-readable message.
        message: String,
    },

    /// Unexpected internal failure.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Shorthand for a parameter validation failure.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Integer code reported to the caller; 500 when unclassified.
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Upstream { code, .. } => *code,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

impl From<AeroApiError> for RpcError {
    fn from(err: AeroApiError) -> Self {
        Self::Upstream {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
