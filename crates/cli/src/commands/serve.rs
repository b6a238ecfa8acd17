//! `gamewizard serve`: start the web UI and JSON API.

use std::path::Path;

use tracing::info;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        info!(port, "Port overridden from the command line");
        config.gateway.port = port;
    }

    println!("🎮 Game Wizard");
    println!("   Open:      http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Knowledge: {}", config.retrieval.backend);
    println!("   Models:    {}", config.completion.models.join(", "));

    gamewizard_gateway::start(config).await?;

    Ok(())
}
