//! Per-connection sessions: read loop, writer task, liveness supervision.
//!
//! Each accepted socket gets one session task. Inside it: a writer task
//! owning the write half and the outbound queue, a liveness task, and the
//! read loop. Payloads dispatch concurrently (pipelining); responses
//! correlate to requests only via `id`, never via ordering.
//!
//! Session behavior is exercised end-to-end in `tests/integration.rs`.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use skybridge_rpc::dispatch::Dispatcher;

use crate::config::{GatewayConfig, TransportMode};
use crate::connection::{ConnectionTable, GatewayConnection, Outbound};
use crate::framing::StreamFramer;
use crate::liveness::{LivenessOutcome, run_idle_watch, run_probe};

/// Read buffer size for the stream transport.
const READ_BUF_SIZE: usize = 8 * 1024;

/// Dispatch one payload concurrently and reply on the originating
/// connection. A gone connection silently drops the response.
fn spawn_dispatch(
    dispatcher: Arc<Dispatcher>,
    connection: Arc<GatewayConnection>,
    payload: String,
) {
    let _ = tokio::spawn(async move {
        let response = dispatcher.dispatch_payload(&payload).await;
        if !connection.send_response(&response) {
            debug!(conn_id = %connection.id, "connection gone, response dropped");
        }
    });
}

/// Register a connection and spawn its liveness task.
///
/// The liveness task cancels the session token when the peer is presumed
/// dead, which unwinds the read loop and writer through the one cleanup
/// path.
async fn open_connection(
    peer: SocketAddr,
    transport: TransportMode,
    tx: mpsc::Sender<Outbound>,
    table: &ConnectionTable,
    timeout: std::time::Duration,
    cancel: &CancellationToken,
) -> (Arc<GatewayConnection>, tokio::task::JoinHandle<()>) {
    let id = format!("conn_{}", Uuid::now_v7().simple());
    let connection = Arc::new(GatewayConnection::new(id, peer, transport, tx));
    table.add(connection.clone()).await;

    info!(conn_id = %connection.id, %peer, %transport, "client connected");
    counter!("gateway_connections_total", "transport" => transport.to_string()).increment(1);
    gauge!("gateway_connections_active").increment(1.0);

    let liveness = tokio::spawn({
        let connection = connection.clone();
        let cancel = cancel.clone();
        async move {
            let outcome = match transport {
                TransportMode::Stream => {
                    run_idle_watch(connection, timeout, cancel.child_token()).await
                }
                TransportMode::Message => {
                    run_probe(connection, timeout, cancel.child_token()).await
                }
            };
            if outcome == LivenessOutcome::PeerDead {
                cancel.cancel();
            }
        }
    });

    (connection, liveness)
}

/// Tear down a connection exactly once.
async fn close_connection(
    connection: &Arc<GatewayConnection>,
    table: &ConnectionTable,
    cancel: &CancellationToken,
    liveness: tokio::task::JoinHandle<()>,
) {
    cancel.cancel();
    let _ = liveness.await;
    table.remove(&connection.id).await;

    info!(conn_id = %connection.id, dropped = connection.drop_count(), "client disconnected");
    gauge!("gateway_connections_active").decrement(1.0);
    histogram!("gateway_connection_duration_seconds", "transport" => connection.transport.to_string())
        .record(connection.age().as_secs_f64());
}

/// Run one raw-TCP session: newline-delimited JSON in both directions.
#[instrument(skip_all, fields(peer = %peer))]
pub async fn run_stream_session(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    table: Arc<ConnectionTable>,
    config: GatewayConfig,
    shutdown: CancellationToken,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(config.channel_capacity);
    let cancel = shutdown.child_token();

    let (connection, liveness) = open_connection(
        peer,
        TransportMode::Stream,
        tx,
        &table,
        config.request_timeout(),
        &cancel,
    )
    .await;

    // Writer: forwards queued responses, then flushes and half-closes.
    let writer = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    cmd = rx.recv() => match cmd {
                        Some(Outbound::Text(mut line)) => {
                            line.push('\n');
                            if write_half.write_all(line.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                        // Transport pings are a WebSocket concern.
                        Some(Outbound::Ping | Outbound::Pong(_)) => {}
                        None => break,
                    },
                    () = cancel.cancelled() => break,
                }
            }
            while let Ok(cmd) = rx.try_recv() {
                if let Outbound::Text(mut line) = cmd {
                    line.push('\n');
                    if write_half.write_all(line.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
            let _ = write_half.shutdown().await;
        }
    });

    // Read loop: the framer's buffer is owned here and nowhere else.
    let mut framer = StreamFramer::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            read = read_half.read(&mut buf) => match read {
                Ok(0) => {
                    debug!(conn_id = %connection.id, "peer closed the stream");
                    break;
                }
                Ok(n) => {
                    connection.touch();
                    for payload in framer.push(&buf[..n]) {
                        spawn_dispatch(dispatcher.clone(), connection.clone(), payload);
                    }
                    if framer.buffered_len() > config.max_message_bytes {
                        warn!(conn_id = %connection.id, "undelimited input exceeds limit, closing");
                        break;
                    }
                }
                Err(e) => {
                    debug!(conn_id = %connection.id, error = %e, "stream read failed");
                    break;
                }
            }
        }
    }

    close_connection(&connection, &table, &cancel, liveness).await;
    let _ = writer.await;
}

/// Run one WebSocket session: one JSON payload per frame.
#[instrument(skip_all, fields(peer = %peer))]
pub async fn run_ws_session(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    table: Arc<ConnectionTable>,
    config: GatewayConfig,
    shutdown: CancellationToken,
) {
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(config.max_message_bytes))
        .max_frame_size(Some(config.max_message_bytes));
    let ws = match tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (tx, mut rx) = mpsc::channel::<Outbound>(config.channel_capacity);
    let cancel = shutdown.child_token();

    let (connection, liveness) = open_connection(
        peer,
        TransportMode::Message,
        tx,
        &table,
        config.request_timeout(),
        &cancel,
    )
    .await;

    // Writer: forwards responses and probe frames, closes with a Close frame.
    let writer = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    cmd = rx.recv() => {
                        let frame = match cmd {
                            Some(Outbound::Text(text)) => Message::Text(text.into()),
                            Some(Outbound::Ping) => Message::Ping(Bytes::new()),
                            Some(Outbound::Pong(payload)) => Message::Pong(payload.into()),
                            None => break,
                        };
                        if ws_tx.send(frame).await.is_err() {
                            return;
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
            while let Ok(cmd) = rx.try_recv() {
                if let Outbound::Text(text) = cmd {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
            }
            let _ = ws_tx.send(Message::Close(None)).await;
        }
    });

    // Read loop: every inbound frame confirms liveness.
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            frame = ws_rx.next() => match frame {
                Some(Ok(message)) => {
                    connection.touch();
                    match message {
                        Message::Text(text) => {
                            spawn_dispatch(
                                dispatcher.clone(),
                                connection.clone(),
                                text.as_str().to_owned(),
                            );
                        }
                        Message::Binary(data) => {
                            // Non-UTF-8 bytes become a payload that fails
                            // JSON parsing, yielding the -32700 response.
                            spawn_dispatch(
                                dispatcher.clone(),
                                connection.clone(),
                                String::from_utf8_lossy(&data).into_owned(),
                            );
                        }
                        Message::Ping(payload) => {
                            let _ = connection.send(Outbound::Pong(payload.to_vec()));
                        }
                        Message::Pong(_) | Message::Frame(_) => {}
                        Message::Close(_) => {
                            debug!(conn_id = %connection.id, "peer sent close frame");
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    debug!(conn_id = %connection.id, error = %e, "WebSocket read failed");
                    break;
                }
                None => break,
            }
        }
    }

    close_connection(&connection, &table, &cancel, liveness).await;
    let _ = writer.await;
}
