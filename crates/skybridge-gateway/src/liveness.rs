//! Per-connection liveness supervision.
//!
//! Two policies, one per transport:
//!
//! - Stream connections get an idle watch that notifies the peer and
//!   re-arms — an idle peer between requests is legitimate, so idleness
//!   alone never closes the connection.
//! - WebSocket connections get a ping probe that escalates: notify past
//!   one timeout of silence, terminate past two.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use skybridge_rpc::error::REQUEST_TIMEOUT;
use skybridge_rpc::types::Response;

use crate::connection::GatewayConnection;

/// Why a liveness loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessOutcome {
    /// The peer is presumed gone; the session must force-close.
    PeerDead,
    /// The supervision was cancelled externally (connection closing).
    Cancelled,
}

/// The best-effort notification sent when a connection looks stalled.
fn timeout_notification() -> Response {
    Response::failure(None, REQUEST_TIMEOUT, "Request timed out")
}

/// Idle watch for stream connections.
///
/// Sleeps until `timeout` past the last recorded activity. When it fires,
/// sends the timeout notification and re-arms. Only a failed enqueue
/// (writer gone, socket broken) reports the peer dead.
pub async fn run_idle_watch(
    connection: Arc<GatewayConnection>,
    timeout: Duration,
    cancel: CancellationToken,
) -> LivenessOutcome {
    loop {
        let elapsed = connection.last_activity_elapsed();
        let wait = timeout.saturating_sub(elapsed);

        tokio::select! {
            () = cancel.cancelled() => return LivenessOutcome::Cancelled,
            () = tokio::time::sleep(wait) => {
                if connection.last_activity_elapsed() >= timeout {
                    debug!(conn_id = %connection.id, "connection idle, notifying peer");
                    if !connection.send_response(&timeout_notification()) {
                        return LivenessOutcome::PeerDead;
                    }
                    // Re-arm rather than close; transport errors will
                    // surface a genuinely dead peer.
                    connection.touch();
                }
            }
        }
    }
}

/// Ping probe for WebSocket connections.
///
/// Ticks at a third of the timeout. Per tick, with `elapsed` measured
/// from the last confirmed activity (any inbound frame):
/// over 2× the timeout the peer is presumed gone; over 1× the client is
/// notified of the timeout condition; otherwise a Ping frame goes out.
pub async fn run_probe(
    connection: Arc<GatewayConnection>,
    timeout: Duration,
    cancel: CancellationToken,
) -> LivenessOutcome {
    let mut tick = tokio::time::interval(timeout / 3);
    // The immediate first tick would probe a connection that just opened.
    let _ = tick.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => return LivenessOutcome::Cancelled,
            _ = tick.tick() => {
                let elapsed = connection.last_activity_elapsed();
                if elapsed > timeout * 2 {
                    warn!(conn_id = %connection.id, elapsed_ms = elapsed.as_millis() as u64,
                        "peer unresponsive, terminating");
                    return LivenessOutcome::PeerDead;
                }
                if elapsed > timeout {
                    debug!(conn_id = %connection.id, "peer quiet past timeout, notifying");
                    let _ = connection.send_response(&timeout_notification());
                } else if !connection.send_ping() {
                    return LivenessOutcome::PeerDead;
                }
            }
        }
    }
}
