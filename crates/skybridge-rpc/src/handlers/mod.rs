//! Method handler modules and registration.

pub mod aircraft;
pub mod airports;
pub mod flights;

use serde_json::{Map, Value};

use crate::error::RpcError;
use crate::registry::MethodRegistry;

/// Register all flight-data handlers with the registry.
pub fn register_all(registry: &mut MethodRegistry) {
    registry.register("getFlightByIdent", flights::FlightByIdentHandler);
    registry.register("getFlightDetails", flights::FlightDetailsHandler);
    registry.register("getFlightsForAirport", flights::AirportFlightsHandler);
    registry.register("getAirportsByRegion", airports::AirportSearchHandler);
    registry.register("getAircraftByTail", aircraft::AircraftByTailHandler);
}

/// Extract a required non-empty string parameter.
pub(crate) fn require_string_param(
    params: &Map<String, Value>,
    key: &str,
    message: &str,
) -> Result<String, RpcError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| RpcError::invalid_params(message))
}
