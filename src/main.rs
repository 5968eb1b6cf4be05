//! Demo binary exercising the edge client core end to end.
//!
//! Loads a config file, logs in, lists services, installs them into the
//! posture engine, runs one manual tick, then starts the recurring posture
//! loop and waits for Ctrl-C. A thin driver, not a full SDK embedding --
//! real embedders own their own lifetime and call into [`edge_client`] directly.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use edge_client::config::Config;
use edge_client::EdgeClient;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config/config.yaml".to_string());
    let config = Config::load(std::path::Path::new(&config_path))
        .with_context(|| format!("loading config from {config_path}"))?;

    let client = EdgeClient::new(&config).context("building edge client")?;

    client
        .controller()
        .login(vec!["all".to_string()])
        .await
        .context("logging in to controller")?;

    let services = client.controller().services().await.context("listing services")?;
    tracing::info!(count = services.len(), "fetched service catalog");
    client.set_services(services).await;

    client.posture_engine().tick(client.controller().current_api_session_id().as_deref(), client.controller().instance_id().as_deref()).await;

    client.start();
    tracing::info!("posture loop started, waiting for ctrl-c");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    client.stop();

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
