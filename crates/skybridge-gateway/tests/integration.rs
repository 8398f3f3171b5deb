//! End-to-end tests driving the gateway over real TCP and WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use skybridge_aeroapi::AeroApi;
use skybridge_gateway::config::{GatewayConfig, TransportMode};
use skybridge_gateway::server::Gateway;
use skybridge_rpc::context::RpcContext;
use skybridge_rpc::error::RpcError;
use skybridge_rpc::registry::{MethodHandler, MethodRegistry};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

type LineReader = tokio::io::Lines<BufReader<OwnedReadHalf>>;

// ── Stub handlers ───────────────────────────────────────────────────

struct FlightStub;

#[async_trait]
impl MethodHandler for FlightStub {
    async fn handle(
        &self,
        _params: Map<String, Value>,
        _ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        Ok(json!({"status": "Scheduled"}))
    }
}

struct EchoStub;

#[async_trait]
impl MethodHandler for EchoStub {
    async fn handle(
        &self,
        params: Map<String, Value>,
        _ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        Ok(Value::Object(params))
    }
}

struct NeverStub;

#[async_trait]
impl MethodHandler for NeverStub {
    async fn handle(
        &self,
        _params: Map<String, Value>,
        _ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        std::future::pending().await
    }
}

struct SlowStub;

#[async_trait]
impl MethodHandler for SlowStub {
    async fn handle(
        &self,
        _params: Map<String, Value>,
        _ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        sleep(Duration::from_millis(150)).await;
        Ok(json!("slow done"))
    }
}

struct FailStub;

#[async_trait]
impl MethodHandler for FailStub {
    async fn handle(
        &self,
        _params: Map<String, Value>,
        _ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        Err(RpcError::Upstream {
            code: 404,
            message: "Unknown ident".into(),
        })
    }
}

fn stub_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry.register("getFlightByIdent", FlightStub);
    registry.register("echo", EchoStub);
    registry.register("hang", NeverStub);
    registry.register("slow", SlowStub);
    registry.register("fail", FailStub);
    registry
}

/// Boot a gateway with stub handlers on an auto-assigned port.
async fn boot(transport: TransportMode, request_timeout_ms: u64) -> (SocketAddr, Gateway) {
    let aero = AeroApi::with_base_url("test-key", "http://127.0.0.1:9").unwrap();
    let ctx = RpcContext::new(Arc::new(aero));
    let config = GatewayConfig {
        transport,
        request_timeout_ms,
        ..GatewayConfig::default()
    };
    let gateway = Gateway::new(config, stub_registry(), ctx);
    let addr = gateway.start().await.unwrap();
    (addr, gateway)
}

// ── Stream client helpers ───────────────────────────────────────────

async fn connect_stream(addr: SocketAddr) -> (OwnedWriteHalf, LineReader) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, write) = stream.into_split();
    (write, BufReader::new(read).lines())
}

async fn send_line(write: &mut OwnedWriteHalf, payload: &str) {
    write.write_all(payload.as_bytes()).await.unwrap();
    write.write_all(b"\n").await.unwrap();
}

/// Read until a response for the given id appears; liveness notifications
/// (`id: null`) and sibling responses are skipped.
async fn response_for_id(lines: &mut LineReader, id: &Value) -> Value {
    loop {
        let line = timeout(TIMEOUT, lines.next_line())
            .await
            .expect("timed out waiting for response")
            .unwrap()
            .expect("connection closed while waiting for response");
        let value: Value = serde_json::from_str(&line).unwrap();
        if &value["id"] == id {
            return value;
        }
    }
}

async fn wait_for_connection_count(gateway: &Gateway, expected: usize) {
    for _ in 0..200 {
        if gateway.connection_count().await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "connection count never reached {expected} (now {})",
        gateway.connection_count().await
    );
}

// ── WebSocket client helpers ────────────────────────────────────────

async fn connect_ws(addr: SocketAddr) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

/// Read until the next JSON text frame for the given id.
async fn ws_response_for_id(ws: &mut WsStream, id: &Value) -> Value {
    loop {
        let frame = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed while waiting for frame")
            .unwrap();
        if let Message::Text(text) = frame {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            if &value["id"] == id {
                return value;
            }
        }
    }
}

// ── Stream transport ────────────────────────────────────────────────

#[tokio::test]
async fn stream_request_gets_one_delimited_response() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    send_line(
        &mut write,
        r#"{"id":"1","method":"getFlightByIdent","params":{"ident":"AAL100"}}"#,
    )
    .await;

    let line = timeout(TIMEOUT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value, json!({"id": "1", "result": {"status": "Scheduled"}}));

    gateway.stop().await;
}

#[tokio::test]
async fn stream_parse_error_keeps_connection_usable() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    send_line(&mut write, "not-json").await;
    let error = response_for_id(&mut lines, &Value::Null).await;
    assert_eq!(error["error"]["code"], -32700);
    assert_eq!(error["error"]["message"], "Parse error");

    // Subsequent payloads on the same connection still work.
    send_line(&mut write, r#"{"id":"2","method":"echo","params":{"x":1}}"#).await;
    let ok = response_for_id(&mut lines, &json!("2")).await;
    assert_eq!(ok["result"]["x"], 1);

    gateway.stop().await;
}

#[tokio::test]
async fn stream_invalid_and_unknown_requests() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    // Missing method echoes the id with -32600.
    send_line(&mut write, r#"{"id":"a"}"#).await;
    let invalid = response_for_id(&mut lines, &json!("a")).await;
    assert_eq!(invalid["error"]["code"], -32600);

    // Missing id cannot echo anything.
    send_line(&mut write, r#"{"method":"echo"}"#).await;
    let anonymous = response_for_id(&mut lines, &Value::Null).await;
    assert_eq!(anonymous["error"]["code"], -32600);

    // Unknown method echoes the id with -32601.
    send_line(&mut write, r#"{"id":"b","method":"warpDrive"}"#).await;
    let unknown = response_for_id(&mut lines, &json!("b")).await;
    assert_eq!(unknown["error"]["code"], -32601);

    gateway.stop().await;
}

#[tokio::test]
async fn stream_handler_error_code_reaches_client() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    send_line(&mut write, r#"{"id":"f","method":"fail"}"#).await;
    let resp = response_for_id(&mut lines, &json!("f")).await;
    assert_eq!(resp["error"]["code"], 404);
    assert_eq!(resp["error"]["message"], "Unknown ident");

    gateway.stop().await;
}

#[tokio::test]
async fn stream_byte_at_a_time_delivery() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    let request = b"{\"id\":\"z\",\"method\":\"echo\",\"params\":{\"ok\":true}}\n";
    for byte in request {
        write.write_all(&[*byte]).await.unwrap();
        write.flush().await.unwrap();
        sleep(Duration::from_millis(1)).await;
    }

    let resp = response_for_id(&mut lines, &json!("z")).await;
    assert_eq!(resp["result"]["ok"], true);

    gateway.stop().await;
}

#[tokio::test]
async fn stream_pipelined_requests_complete_out_of_order() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    // Two requests in one write: the slow one first, the fast one second.
    let batch = "{\"id\":\"s\",\"method\":\"slow\"}\n{\"id\":\"q\",\"method\":\"echo\"}\n";
    write.write_all(batch.as_bytes()).await.unwrap();

    // The fast response overtakes the slow one.
    let first = timeout(TIMEOUT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let first: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["id"], "q");

    let second = response_for_id(&mut lines, &json!("s")).await;
    assert_eq!(second["result"], "slow done");

    gateway.stop().await;
}

#[tokio::test]
async fn stream_timeout_reports_once_and_never_again() {
    let (addr, gateway) = boot(TransportMode::Stream, 50).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    send_line(&mut write, r#"{"id":"1","method":"hang"}"#).await;
    let resp = response_for_id(&mut lines, &json!("1")).await;
    assert_eq!(resp["error"]["code"], -32001);
    assert_eq!(resp["error"]["message"], "Request timed out");

    // No second response for the same id ever follows.
    let second = timeout(
        Duration::from_millis(300),
        response_for_id(&mut lines, &json!("1")),
    )
    .await;
    assert!(second.is_err());

    gateway.stop().await;
}

#[tokio::test]
async fn stream_idle_peer_notified_but_not_closed() {
    let (addr, gateway) = boot(TransportMode::Stream, 80).await;
    let (mut write, mut lines) = connect_stream(addr).await;

    // Send nothing: the idle watch fires a null-id timeout notification.
    let note = response_for_id(&mut lines, &Value::Null).await;
    assert_eq!(note["error"]["code"], -32001);

    // Idleness alone is not fatal; the connection still serves requests.
    send_line(&mut write, r#"{"id":"after","method":"echo"}"#).await;
    let resp = response_for_id(&mut lines, &json!("after")).await;
    assert!(resp["result"].is_object());

    gateway.stop().await;
}

#[tokio::test]
async fn stream_stop_closes_connections_and_listener() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let (_write, mut lines) = connect_stream(addr).await;
    wait_for_connection_count(&gateway, 1).await;

    gateway.stop().await;

    // Graceful close surfaces as EOF on the client.
    let eof = timeout(TIMEOUT, lines.next_line()).await.unwrap().unwrap();
    assert!(eof.is_none());

    // The listener is gone; new connections are refused.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn stream_connection_count_tracks_lifecycle() {
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    assert_eq!(gateway.connection_count().await, 0);

    let client = TcpStream::connect(addr).await.unwrap();
    wait_for_connection_count(&gateway, 1).await;

    drop(client);
    wait_for_connection_count(&gateway, 0).await;

    gateway.stop().await;
}

// ── Message (WebSocket) transport ───────────────────────────────────

#[tokio::test]
async fn ws_request_gets_one_response_frame() {
    let (addr, gateway) = boot(TransportMode::Message, 5_000).await;
    let mut ws = connect_ws(addr).await;

    ws.send(Message::Text(
        r#"{"id":"1","method":"getFlightByIdent","params":{"ident":"AAL100"}}"#.into(),
    ))
    .await
    .unwrap();

    let resp = ws_response_for_id(&mut ws, &json!("1")).await;
    assert_eq!(resp, json!({"id": "1", "result": {"status": "Scheduled"}}));

    gateway.stop().await;
}

#[tokio::test]
async fn ws_parse_error_keeps_connection_open() {
    let (addr, gateway) = boot(TransportMode::Message, 5_000).await;
    let mut ws = connect_ws(addr).await;

    ws.send(Message::Text("not-json".into())).await.unwrap();
    let error = ws_response_for_id(&mut ws, &Value::Null).await;
    assert_eq!(error["error"]["code"], -32700);
    assert_eq!(error["error"]["message"], "Parse error");

    ws.send(Message::Text(r#"{"id":"2","method":"echo"}"#.into()))
        .await
        .unwrap();
    let ok = ws_response_for_id(&mut ws, &json!("2")).await;
    assert!(ok["result"].is_object());

    gateway.stop().await;
}

#[tokio::test]
async fn ws_binary_frame_is_a_payload() {
    let (addr, gateway) = boot(TransportMode::Message, 5_000).await;
    let mut ws = connect_ws(addr).await;

    ws.send(Message::Binary(
        br#"{"id":"b1","method":"echo","params":{"via":"binary"}}"#
            .to_vec()
            .into(),
    ))
    .await
    .unwrap();

    let resp = ws_response_for_id(&mut ws, &json!("b1")).await;
    assert_eq!(resp["result"]["via"], "binary");

    gateway.stop().await;
}

#[tokio::test]
async fn ws_timeout_reports_once_and_never_again() {
    let (addr, gateway) = boot(TransportMode::Message, 50).await;
    let mut ws = connect_ws(addr).await;

    ws.send(Message::Text(r#"{"id":"1","method":"hang"}"#.into()))
        .await
        .unwrap();
    let resp = ws_response_for_id(&mut ws, &json!("1")).await;
    assert_eq!(resp["error"]["code"], -32001);

    let second = timeout(
        Duration::from_millis(300),
        ws_response_for_id(&mut ws, &json!("1")),
    )
    .await;
    assert!(second.is_err());

    gateway.stop().await;
}

#[tokio::test]
async fn ws_client_ping_gets_pong() {
    let (addr, gateway) = boot(TransportMode::Message, 5_000).await;
    let mut ws = connect_ws(addr).await;

    ws.send(Message::Ping(b"probe".to_vec().into()))
        .await
        .unwrap();

    let pong = loop {
        let frame = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Pong(payload) = frame {
            break payload;
        }
    };
    assert_eq!(&pong[..], b"probe");

    gateway.stop().await;
}

#[tokio::test]
async fn ws_unresponsive_peer_is_terminated() {
    let (addr, gateway) = boot(TransportMode::Message, 60).await;
    let mut ws = connect_ws(addr).await;
    wait_for_connection_count(&gateway, 1).await;

    // Never answer pings: past twice the timeout the server gives up.
    sleep(Duration::from_millis(400)).await;
    wait_for_connection_count(&gateway, 0).await;

    // Draining the client side ends in a close or error, not more data.
    let ended = timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());

    gateway.stop().await;
}

#[tokio::test]
async fn ws_stop_sends_close_frame() {
    let (addr, gateway) = boot(TransportMode::Message, 5_000).await;
    let mut ws = connect_ws(addr).await;
    wait_for_connection_count(&gateway, 1).await;

    gateway.stop().await;

    let closed = timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn transports_are_isolated_per_instance() {
    // A stream-mode gateway does not answer WebSocket handshakes with a
    // valid upgrade; the client handshake fails.
    let (addr, gateway) = boot(TransportMode::Stream, 5_000).await;
    let result = timeout(TIMEOUT, connect_async(format!("ws://{addr}"))).await;
    match result {
        Ok(Ok(_)) => panic!("stream gateway accepted a WebSocket handshake"),
        Ok(Err(_)) | Err(_) => {}
    }
    gateway.stop().await;
}
