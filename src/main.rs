use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flow_core::{
    DEFAULT_FLOW_DATA_DIR, DEFAULT_SLOT_NAME, FlowConfig, sync_interval_from_env_value,
};

/// Main entry point for the patient flow service
///
/// Loads `.env`, resolves configuration once and serves the REST API, including the
/// `/events` change feed and the background poller that picks up writes made by other
/// processes sharing the same slot.
///
/// # Environment Variables
/// - `FLOW_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FLOW_DATA_DIR`: Directory holding the flow slot (default: "flow_data")
/// - `FLOW_SLOT_NAME`: Slot name within the data directory (default: "patient_flow")
/// - `FLOW_SYNC_INTERVAL_MS`: Poll interval in milliseconds (default: 1000)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flow_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("flow_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("FLOW_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = std::env::var("FLOW_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_FLOW_DATA_DIR));
    let slot_name = std::env::var("FLOW_SLOT_NAME").unwrap_or_else(|_| DEFAULT_SLOT_NAME.into());
    let sync_interval = sync_interval_from_env_value(std::env::var("FLOW_SYNC_INTERVAL_MS").ok())?;

    let cfg = FlowConfig::new(data_dir, slot_name, sync_interval)?;

    tracing::info!("++ Starting patient flow REST on {}", rest_addr);
    tracing::info!("++ Flow slot at {}", cfg.slot_path().display());

    api_rest::serve(cfg, &rest_addr).await
}
