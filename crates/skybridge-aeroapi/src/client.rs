//! AeroAPI client: request building, response unwrapping, retries.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::AeroApiError;
use crate::retry::RetryConfig;

/// Production base URL for the AeroAPI.
const DEFAULT_BASE_URL: &str = "https://aeroapi.flightaware.com/aeroapi/v4";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the FlightAware AeroAPI.
///
/// Holds a shared `reqwest::Client` with the API key and accept headers
/// preconfigured. Cheap to clone behind an `Arc`; safe for concurrent use.
#[derive(Debug)]
pub struct AeroApi {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl AeroApi {
    /// Create a client against the production AeroAPI.
    pub fn new(api_key: &str) -> Result<Self, AeroApiError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against an explicit base URL (test seam).
    pub fn with_base_url(
        api_key: &str,
        base_url: impl Into<String>,
    ) -> Result<Self, AeroApiError> {
        let key = HeaderValue::from_str(api_key).map_err(|e| AeroApiError::InvalidKey {
            message: e.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-apikey", key);
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AeroApiError::InvalidKey {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// `GET /flights/{ident}` — flight information by identifier.
    pub async fn flight_by_ident(&self, ident: &str) -> Result<Value, AeroApiError> {
        self.get(&format!("/flights/{ident}"), &[]).await
    }

    /// `GET /flights/{ident}/details` — detailed flight information.
    pub async fn flight_details(&self, ident: &str) -> Result<Value, AeroApiError> {
        self.get(&format!("/flights/{ident}/details"), &[]).await
    }

    /// `GET /airports/{code}/flights` — arrivals/departures for an airport.
    pub async fn airport_flights(
        &self,
        code: &str,
        query: &[(&str, String)],
    ) -> Result<Value, AeroApiError> {
        self.get(&format!("/airports/{code}/flights"), query).await
    }

    /// `GET /airports` — airport search.
    pub async fn airports(&self, query: &[(&str, String)]) -> Result<Value, AeroApiError> {
        self.get("/airports", query).await
    }

    /// `GET /aircraft/{tail}` — aircraft information by tail number.
    pub async fn aircraft_by_tail(&self, tail: &str) -> Result<Value, AeroApiError> {
        self.get(&format!("/aircraft/{tail}"), &[]).await
    }

    /// Issue a GET with retries for retryable failures.
    #[instrument(skip(self, query))]
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, AeroApiError> {
        let mut attempt: u32 = 0;
        loop {
            match self.send(path, query).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff_delay(attempt, rand::random::<f64>());
                    warn!(
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying AeroAPI request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One request/response cycle with status and body mapping.
    async fn send(&self, path: &str, query: &[(&str, String)]) -> Result<Value, AeroApiError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(AeroApiError::from)?;
        let status = response.status();

        if status.is_success() {
            debug!(path, status = status.as_u16(), "AeroAPI request ok");
            let body = response.text().await.map_err(AeroApiError::from)?;
            return serde_json::from_str(&body).map_err(|e| AeroApiError::Decode {
                message: e.to_string(),
            });
        }

        Err(status_error(status, response.text().await.ok()))
    }
}

/// Build a `Status` error, preferring the body's own message.
fn status_error(status: StatusCode, body: Option<String>) -> AeroApiError {
    let message = body
        .as_deref()
        .and_then(|text| serde_json::from_str::<Value>(text).ok())
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| format!("AeroAPI error: {}", status.as_u16()));

    AeroApiError::Status {
        code: status.as_u16(),
        message,
    }
}
