//! Flight handlers: lookup by ident, details, airport arrivals/departures.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::instrument;

use crate::context::RpcContext;
use crate::error::RpcError;
use crate::handlers::require_string_param;
use crate::registry::MethodHandler;

/// Flight types accepted by the upstream `type` filter.
const FLIGHT_TYPES: [&str; 3] = ["airline", "general_aviation", "all"];

/// `getFlightByIdent` — flight information by identifier (e.g. `AAL100`).
pub struct FlightByIdentHandler;

#[async_trait]
impl MethodHandler for FlightByIdentHandler {
    #[instrument(skip_all, fields(method = "getFlightByIdent"))]
    async fn handle(
        &self,
        params: Map<String, Value>,
        ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        let ident =
            require_string_param(&params, "ident", "Flight identifier (ident) is required")?;
        Ok(ctx.aero.flight_by_ident(&ident).await?)
    }
}

/// `getFlightDetails` — detailed information for one flight.
pub struct FlightDetailsHandler;

#[async_trait]
impl MethodHandler for FlightDetailsHandler {
    #[instrument(skip_all, fields(method = "getFlightDetails"))]
    async fn handle(
        &self,
        params: Map<String, Value>,
        ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        let ident =
            require_string_param(&params, "ident", "Flight identifier (ident) is required")?;
        Ok(ctx.aero.flight_details(&ident).await?)
    }
}

/// `getFlightsForAirport` — flights arriving at or departing from an airport.
pub struct AirportFlightsHandler;

#[async_trait]
impl MethodHandler for AirportFlightsHandler {
    #[instrument(skip_all, fields(method = "getFlightsForAirport"))]
    async fn handle(
        &self,
        params: Map<String, Value>,
        ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError> {
        let code = require_string_param(&params, "airport_code", "Airport code is required")?;

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(kind) = params.get("type").and_then(Value::as_str) {
            if FLIGHT_TYPES.contains(&kind) {
                query.push(("type", kind.to_owned()));
            }
        }

        // Only a one-sided request narrows the upstream filter; asking for
        // both (or neither) returns everything.
        let arrivals = params.get("arrivals").and_then(Value::as_bool) == Some(true);
        let departures = params.get("departures").and_then(Value::as_bool) == Some(true);
        match (arrivals, departures) {
            (true, false) => query.push(("filter", "arrivals".into())),
            (false, true) => query.push(("filter", "departures".into())),
            _ => {}
        }

        let body = ctx.aero.airport_flights(&code, &query).await?;
        let flights = body
            .get("arrivals")
            .into_iter()
            .chain(body.get("departures"))
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| body.clone());

        Ok(json!({
            "airport_code": code,
            "flights": flights,
        }))
    }
}
