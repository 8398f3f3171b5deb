//! # skybridge-rpc
//!
//! The JSON-RPC protocol layer of the gateway:
//!
//! - Wire types: request, response, error body (numeric protocol codes)
//! - Method registry mapping method names to async handlers
//! - Dispatcher: parse → validate → look up → execute under a deadline
//! - Flight-data handlers backed by the AeroAPI client

#![deny(unsafe_code)]

pub mod context;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod types;
