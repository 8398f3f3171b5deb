//! Aircraft lookup handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::context::RpcContext;
use crate::error::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// `getAircraftByTail` — aircraft information by tail number (e.g. `N12345`).
pub struct AircraftByTailHandler;

#[async_trait]
impl MethodHandler for AircraftByTailHandler {
    #[instrument(skip_all, fields(method = "getAircraftByTail"))]
    async fn handle(
        &self,
        params: Map<String, Value>,
        ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        let tail = require_string_param(&params, "tail", "Aircraft tail number is required")?;
        Ok(ctx.aero.aircraft_by_tail(&tail).await?)
    }
}
