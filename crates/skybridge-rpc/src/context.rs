//! RPC dependency-injection context.

use std::sync::Arc;
use std::time::Instant;

use skybridge_aeroapi::AeroApi;

/// Shared context passed to every method handler.
///
/// Assembled once at startup and shared read-only by all connections.
pub struct RpcContext {
    /// Upstream AeroAPI client.
    pub aero: Arc<AeroApi>,
    /// When the server started.
    pub start_time: Instant,
}

impl RpcContext {
    /// Create a context around the shared upstream client.
    pub fn new(aero: Arc<AeroApi>) -> Self {
        Self {
            aero,
            start_time: Instant::now(),
        }
    }
}
