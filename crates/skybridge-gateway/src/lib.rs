//! # skybridge-gateway
//!
//! The transport core of the RPC gateway:
//!
//! - Newline-delimited framing for raw TCP streams (buffered, chunk-safe)
//! - One-payload-per-frame WebSocket transport via `tokio-tungstenite`
//! - Per-connection liveness supervision (idle watch, ping probes)
//! - Connection table, pipelined per-payload dispatch, graceful shutdown

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod framing;
pub mod liveness;
pub mod server;
pub mod session;
