//! Airport search handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::error::RpcError;
use crate::registry::MethodHandler;

/// Search parameters forwarded to the upstream airports endpoint.
const SEARCH_KEYS: [&str; 3] = ["country", "region", "query"];

/// `getAirportsByRegion` — airports matching a country/region/query.
pub struct AirportSearchHandler;

#[async_trait]
impl MethodHandler for AirportSearchHandler {
    #[instrument(skip_all, fields(method = "getAirportsByRegion"))]
    async fn handle(
        &self,
        params: Map<String, Value>,
        ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        for key in SEARCH_KEYS {
            if let Some(value) = params.get(key).and_then(Value::as_str) {
                if !value.is_empty() {
                    query.push((key, value.to_owned()));
                }
            }
        }
        if query.is_empty() {
            return Err(RpcError::invalid_params(
                "At least one search parameter (country, region, or query) is required",
            ));
        }

        let body = ctx.aero.airports(&query).await?;
        let airports = body
            .get("airports")
            .filter(|v| v.is_array())
            .cloned()
            .unwrap_or_else(|| json!([]));
        let count = body
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| airports.as_array().map_or(0, |a| a.len() as u64));

        Ok(json!({
            "count": count,
            "airports": airports,
        }))
    }
}
