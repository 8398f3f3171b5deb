//! Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which transport a gateway instance serves (mutually exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Raw TCP with newline-delimited JSON payloads.
    Stream,
    /// WebSocket with one JSON payload per frame.
    Message,
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "stream" => Ok(Self::Stream),
            "ws" | "message" => Ok(Self::Message),
            other => Err(format!("Unsupported server mode: {other}")),
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::Message => f.write_str("message"),
        }
    }
}

/// Configuration for one gateway instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Transport served by this instance.
    pub transport: TransportMode,
    /// Uniform per-request deadline in milliseconds; also the liveness
    /// timeout for idle detection and ping probing.
    pub request_timeout_ms: u64,
    /// Max inbound payload size in bytes (buffered line or WS message).
    pub max_message_bytes: usize,
    /// Outbound channel capacity per connection.
    pub channel_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            transport: TransportMode::Stream,
            request_timeout_ms: 30_000,
            max_message_bytes: 16 * 1024 * 1024, // 16 MB
            channel_capacity: 256,
        }
    }
}

impl GatewayConfig {
    /// The request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
