//! # skybridge-aeroapi
//!
//! HTTP client for the FlightAware AeroAPI.
//!
//! - One async call per upstream resource (flights, airports, aircraft)
//! - API key header injection and response unwrapping
//! - Status/transport failures mapped to caller-meaningful error codes
//! - Exponential backoff with jitter for retryable failures

#![deny(unsafe_code)]

mod client;
mod error;
mod retry;

pub use client::AeroApi;
pub use error::AeroApiError;
pub use retry::RetryConfig;
