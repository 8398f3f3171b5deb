//! Per-connection state and the active-connection table.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use skybridge_rpc::types::Response;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::TransportMode;
use crate::framing::encode_text;

/// Command queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// One JSON response text (the writer adds transport framing).
    Text(String),
    /// Transport-level liveness probe (WebSocket Ping frame).
    Ping,
    /// Reply to a client Ping (WebSocket Pong frame with its payload).
    Pong(Vec<u8>),
}

/// One accepted transport link.
///
/// Mutated only by its own session tasks; the table holds it for
/// membership and `stop()` accounting.
pub struct GatewayConnection {
    /// Unique connection ID (for logging/correlation only).
    pub id: String,
    /// Remote endpoint (for logging/correlation only).
    pub peer: SocketAddr,
    /// Which transport this connection speaks.
    pub transport: TransportMode,
    /// When the connection was accepted.
    pub connected_at: Instant,
    tx: mpsc::Sender<Outbound>,
    last_activity: Mutex<Instant>,
    dropped: AtomicU64,
}

impl GatewayConnection {
    /// Create connection state around the writer channel.
    pub fn new(
        id: String,
        peer: SocketAddr,
        transport: TransportMode,
        tx: mpsc::Sender<Outbound>,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer,
            transport,
            connected_at: now,
            tx,
            last_activity: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a command for the writer task.
    ///
    /// Returns `false` when the channel is full or the writer is gone, and
    /// counts the drop.
    pub fn send(&self, command: Outbound) -> bool {
        if self.tx.try_send(command).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and enqueue one response.
    pub fn send_response(&self, response: &Response) -> bool {
        self.send(Outbound::Text(encode_text(response)))
    }

    /// Enqueue a liveness probe.
    pub fn send_ping(&self) -> bool {
        self.send(Outbound::Ping)
    }

    /// Record peer activity (bytes, frames, pongs).
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last recorded peer activity.
    pub fn last_activity_elapsed(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Commands dropped because the writer channel was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The gateway's active-connection set.
///
/// Mutated by every connection's open/close and iterated by `stop()`;
/// the async `RwLock` makes concurrent insert/remove/iteration safe.
#[derive(Default)]
pub struct ConnectionTable {
    connections: tokio::sync::RwLock<HashMap<String, Arc<GatewayConnection>>>,
}

impl ConnectionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<GatewayConnection>) {
        let mut connections = self.connections.write().await;
        if connections
            .insert(connection.id.clone(), connection)
            .is_some()
        {
            warn!("replaced a connection with a duplicate id");
        }
    }

    /// Remove a connection by ID. Removing an absent ID is a no-op.
    pub async fn remove(&self, connection_id: &str) {
        let mut connections = self.connections.write().await;
        let _ = connections.remove(connection_id);
    }

    /// Number of active connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether the table is empty.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Snapshot of the current connections.
    pub async fn snapshot(&self) -> Vec<Arc<GatewayConnection>> {
        self.connections.read().await.values().cloned().collect()
    }
}
