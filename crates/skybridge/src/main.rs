//! # skybridge
//!
//! Gateway server binary — wires the AeroAPI client, the handler
//! registry, and the transport gateway together.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skybridge_aeroapi::AeroApi;
use skybridge_gateway::config::{GatewayConfig, TransportMode};
use skybridge_gateway::server::Gateway;
use skybridge_rpc::context::RpcContext;
use skybridge_rpc::handlers;
use skybridge_rpc::registry::MethodRegistry;

/// Flight-data JSON-RPC gateway over TCP or WebSocket.
#[derive(Parser, Debug)]
#[command(name = "skybridge", version, about = "Flight-data JSON-RPC gateway")]
struct Cli {
    /// Host to bind.
    #[arg(long, env = "SKYBRIDGE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 for auto-assign).
    #[arg(short, long, env = "SKYBRIDGE_PORT", default_value = "8080")]
    port: u16,

    /// Server mode: tcp (newline-delimited stream) or ws (WebSocket).
    #[arg(short, long, env = "SKYBRIDGE_MODE", default_value = "tcp")]
    mode: TransportMode,

    /// FlightAware AeroAPI key.
    #[arg(short = 'k', long, env = "AEROAPI_KEY")]
    aeroapi_key: String,

    /// Request timeout in milliseconds (increase if seeing -32001 errors).
    #[arg(short, long, env = "SKYBRIDGE_REQUEST_TIMEOUT", default_value = "30000")]
    timeout: u64,

    /// Enable verbose debug logging.
    #[arg(short, long, env = "SKYBRIDGE_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let aero = AeroApi::new(&cli.aeroapi_key).context("failed to build the AeroAPI client")?;
    let ctx = RpcContext::new(Arc::new(aero));

    let mut registry = MethodRegistry::new();
    handlers::register_all(&mut registry);

    let config = GatewayConfig {
        host: cli.host,
        port: cli.port,
        transport: cli.mode,
        request_timeout_ms: cli.timeout,
        ..GatewayConfig::default()
    };

    let gateway = Gateway::new(config, registry, ctx);
    let addr = gateway.start().await.context("failed to start the gateway")?;
    info!(%addr, mode = %cli.mode, "skybridge gateway running");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    gateway.stop().await;
    info!("server stopped");

    Ok(())
}
