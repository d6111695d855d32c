//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the patient flow REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging. The workspace's main `flow-run` binary also loads a
//! `.env` file before starting the same server.

use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flow_core::{
    sync_interval_from_env_value, FlowConfig, DEFAULT_FLOW_DATA_DIR, DEFAULT_SLOT_NAME,
};

/// Main entry point for the patient flow REST API server
///
/// # Environment Variables
/// - `FLOW_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `FLOW_DATA_DIR`: Directory holding the flow slot (default: "flow_data")
/// - `FLOW_SLOT_NAME`: Slot name within the data directory (default: "patient_flow")
/// - `FLOW_SYNC_INTERVAL_MS`: Poll interval for writes by other processes (default: 1000)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("FLOW_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = std::env::var("FLOW_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_FLOW_DATA_DIR));
    let slot_name = std::env::var("FLOW_SLOT_NAME").unwrap_or_else(|_| DEFAULT_SLOT_NAME.into());
    let sync_interval = sync_interval_from_env_value(std::env::var("FLOW_SYNC_INTERVAL_MS").ok())?;

    let cfg = FlowConfig::new(data_dir, slot_name, sync_interval)?;

    tracing::info!("-- Starting patient flow REST API on {}", addr);
    api_rest::serve(cfg, &addr).await
}
