//! Gateway lifecycle: listener ownership, accept loop, orderly stop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use skybridge_rpc::context::RpcContext;
use skybridge_rpc::dispatch::Dispatcher;
use skybridge_rpc::registry::MethodRegistry;

use crate::config::{GatewayConfig, TransportMode};
use crate::connection::ConnectionTable;
use crate::session::{run_stream_session, run_ws_session};

/// How long `stop()` waits for sessions to finish before aborting them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure starting the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The listener could not bind (port in use, bad host, ...).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// `start()` was called while a listener is already active.
    #[error("gateway is already running")]
    AlreadyRunning,

    /// The bound listener did not report a local address.
    #[error("failed to read listener address: {0}")]
    ListenerAddr(#[source] std::io::Error),
}

/// State owned by a running listener.
struct Active {
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
}

/// The top-level gateway: one listener, one transport, shared dispatcher.
///
/// Handlers are opaque here; the gateway only knows the registry it was
/// constructed with.
pub struct Gateway {
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
    table: Arc<ConnectionTable>,
    active: Mutex<Option<Active>>,
}

impl Gateway {
    /// Assemble a gateway from its constructed dependencies.
    pub fn new(config: GatewayConfig, registry: MethodRegistry, ctx: RpcContext) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(registry),
            Arc::new(ctx),
            config.request_timeout(),
        ));
        Self {
            config,
            dispatcher,
            table: Arc::new(ConnectionTable::new()),
            active: Mutex::new(None),
        }
    }

    /// Bind the configured listener and begin accepting connections.
    ///
    /// Returns the bound address only after the bind succeeded; a bind
    /// failure is the one fatal startup condition and is surfaced here.
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        if self.active.lock().is_some() {
            return Err(GatewayError::AlreadyRunning);
        }

        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: bind_addr,
                source,
            })?;
        let addr = listener.local_addr().map_err(GatewayError::ListenerAddr)?;

        let shutdown = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            self.dispatcher.clone(),
            self.table.clone(),
            shutdown.clone(),
        ));

        {
            let mut active = self.active.lock();
            if active.is_some() {
                // Lost a concurrent start race; undo this listener.
                shutdown.cancel();
                accept_task.abort();
                return Err(GatewayError::AlreadyRunning);
            }
            *active = Some(Active {
                shutdown,
                accept_task,
            });
        }

        info!(%addr, transport = %self.config.transport, "gateway listening");
        Ok(addr)
    }

    /// Close every connection gracefully, then the listener.
    ///
    /// Resolves only once the listener is confirmed closed. Calling this
    /// with no active listener is a no-op.
    pub async fn stop(&self) {
        let Some(active) = self.active.lock().take() else {
            debug!("stop called with no active listener");
            return;
        };

        info!("stopping gateway");
        active.shutdown.cancel();
        if active.accept_task.await.is_err() {
            warn!("accept loop ended abnormally");
        }
        info!("gateway stopped");
    }

    /// Whether a listener is currently active.
    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Number of connections in the active set.
    pub async fn connection_count(&self) -> usize {
        self.table.len().await
    }

    /// The gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Accept connections until shutdown, then drain sessions.
async fn accept_loop(
    listener: TcpListener,
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
    table: Arc<ConnectionTable>,
    shutdown: CancellationToken,
) {
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let _ = match config.transport {
                        TransportMode::Stream => sessions.spawn(run_stream_session(
                            stream,
                            peer,
                            dispatcher.clone(),
                            table.clone(),
                            config.clone(),
                            shutdown.clone(),
                        )),
                        TransportMode::Message => sessions.spawn(run_ws_session(
                            stream,
                            peer,
                            dispatcher.clone(),
                            table.clone(),
                            config.clone(),
                            shutdown.clone(),
                        )),
                    };
                }
                // Accept failures affect one attempt, not the gateway.
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    // Close the listener before draining so no connection can slip in
    // after stop() resolves.
    drop(listener);

    let drain = async {
        while sessions.join_next().await.is_some() {}
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        warn!("session drain timed out, aborting remaining tasks");
        sessions.abort_all();
    }
}
