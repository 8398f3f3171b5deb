//! Request dispatcher: one raw payload in, exactly one response out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde_json::{Map, Value};
use tracing::{debug, error, instrument, warn};

use crate::context::RpcContext;
use crate::error::{
    INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, REQUEST_TIMEOUT,
};
use crate::registry::MethodRegistry;
use crate::types::{Request, RequestId, Response};

/// Dispatches decoded payloads to registered handlers under a deadline.
///
/// Stateless apart from the registry, the shared handler context, and the
/// uniform request timeout; one instance is shared by every connection.
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(registry: Arc<MethodRegistry>, ctx: Arc<RpcContext>, timeout: Duration) -> Self {
        Self {
            registry,
            ctx,
            timeout,
        }
    }

    /// Turn one raw payload into one response.
    ///
    /// No failure mode escapes this boundary: malformed JSON, bad shape,
    /// unknown methods, handler errors, panics, and deadline misses all
    /// degrade to a well-formed error response.
    #[instrument(skip_all)]
    pub async fn dispatch_payload(&self, payload: &str) -> Response {
        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(_) => {
                warn!("payload is not valid JSON");
                counter!("rpc_errors_total", "error_type" => "parse_error").increment(1);
                return Response::failure(None, PARSE_ERROR, "Parse error");
            }
        };

        match validate_shape(value) {
            Ok(request) => self.dispatch(request).await,
            Err(response) => {
                counter!("rpc_errors_total", "error_type" => "invalid_request").increment(1);
                response
            }
        }
    }

    /// Dispatch a validated request to its handler, racing the deadline.
    #[instrument(skip_all, fields(method = %request.method, id = %request.id))]
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        counter!("rpc_requests_total", "method" => method.clone()).increment(1);

        let Some(handler) = self.registry.get(&method) else {
            counter!("rpc_errors_total", "method" => method.clone(), "error_type" => "method_not_found")
                .increment(1);
            return Response::failure(
                Some(id),
                METHOD_NOT_FOUND,
                format!("Method '{method}' not found"),
            );
        };

        let start = Instant::now();

        // The handler runs as its own task so a missed deadline abandons it
        // without aborting: dropping the join handle detaches the task, and
        // a late result has nowhere to go. One response per id, always.
        let ctx = self.ctx.clone();
        let work = tokio::spawn(async move { handler.handle(params, ctx).await });

        let response = match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(Ok(result))) => Response::success(id, result),
            Ok(Ok(Err(err))) => {
                counter!("rpc_errors_total", "method" => method.clone(), "error_type" => "handler_error")
                    .increment(1);
                debug!(code = err.code(), "handler returned an error");
                Response::from_error(id, &err)
            }
            Ok(Err(join_err)) => {
                counter!("rpc_errors_total", "method" => method.clone(), "error_type" => "handler_panic")
                    .increment(1);
                error!(error = %join_err, "handler task failed");
                Response::failure(Some(id), INTERNAL_ERROR, "Internal error")
            }
            Err(_elapsed) => {
                counter!("rpc_errors_total", "method" => method.clone(), "error_type" => "timeout")
                    .increment(1);
                warn!(timeout_ms = self.timeout.as_millis() as u64, "request timed out");
                Response::failure(Some(id), REQUEST_TIMEOUT, "Request timed out")
            }
        };

        let duration = start.elapsed();
        histogram!("rpc_request_duration_seconds", "method" => method.clone())
            .record(duration.as_secs_f64());
        if duration.as_secs() >= 5 {
            warn!(duration_secs = duration.as_secs_f64(), "slow RPC request");
        }

        response
    }
}

/// Validate the decoded value into a [`Request`].
///
/// Shape failures produce the -32600 response directly, echoing the id
/// when one was decodable.
fn validate_shape(value: Value) -> Result<Request, Response> {
    let Value::Object(mut fields) = value else {
        return Err(Response::failure(None, INVALID_REQUEST, "Invalid request"));
    };

    let Some(id) = fields.get("id").and_then(RequestId::from_value) else {
        return Err(Response::failure(None, INVALID_REQUEST, "Invalid request"));
    };

    let method = fields
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    if method.is_empty() {
        return Err(Response::failure(
            Some(id),
            INVALID_REQUEST,
            "Invalid request",
        ));
    }

    let params = match fields.remove("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Response::failure(
                Some(id),
                INVALID_REQUEST,
                "Invalid request",
            ));
        }
    };

    Ok(Request { id, method, params })
}
