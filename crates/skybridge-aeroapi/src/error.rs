//! Upstream error type and code mapping.

/// Error code reported when the upstream never answered.
pub(crate) const NO_RESPONSE_CODE: i64 = 503;

/// Error code reported when the upstream request timed out.
pub(crate) const TIMEOUT_CODE: i64 = -32001;

/// Failure talking to the AeroAPI.
#[derive(Debug, thiserror::Error)]
pub enum AeroApiError {
    /// The upstream answered with a non-2xx status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Message extracted from the error body, or a generic fallback.
        message: String,
    },

    /// The request was sent but no response arrived.
    #[error("No response from AeroAPI server")]
    NoResponse,

    /// The request exceeded the client timeout.
    #[error("AeroAPI request timed out")]
    TimedOut,

    /// The configured API key cannot be used as a header value.
    #[error("invalid AeroAPI key: {message}")]
    InvalidKey {
        /// What the header layer rejected.
        message: String,
    },

    /// The upstream answered 2xx but the body was not valid JSON.
    #[error("failed to decode AeroAPI response: {message}")]
    Decode {
        /// Decoder failure description.
        message: String,
    },
}

impl AeroApiError {
    /// Caller-meaningful integer code for this failure.
    pub fn code(&self) -> i64 {
        match self {
            Self::Status { code, .. } => i64::from(*code),
            Self::NoResponse => NO_RESPONSE_CODE,
            Self::TimedOut => TIMEOUT_CODE,
            Self::InvalidKey { .. } | Self::Decode { .. } => 500,
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Rate limits, upstream 5xx, and missing responses are retryable;
    /// client errors and timeouts are not (the deadline already passed).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { code, .. } => *code == 429 || (500..=599).contains(code),
            Self::NoResponse => true,
            Self::TimedOut | Self::InvalidKey { .. } | Self::Decode { .. } => false,
        }
    }
}

impl From<reqwest::Error> for AeroApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimedOut
        } else if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else {
            Self::NoResponse
        }
    }
}
