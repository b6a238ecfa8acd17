//! Subcommand implementations.

pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gamewizard_agent::WizardAgent;
use gamewizard_config::AppConfig;

/// The config file in use: `--config` if given, else the default location.
pub fn config_file(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load configuration with environment overrides applied.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load_with_env(&config_file(explicit))
        .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Build the wizard agent and its backends from configuration.
pub fn build_agent(config: &AppConfig) -> Result<Arc<WizardAgent>, Box<dyn std::error::Error>> {
    let backends = gamewizard_providers::build_from_config(config)
        .map_err(|e| format!("Failed to set up backends: {e}"))?;
    Ok(Arc::new(WizardAgent::from_config(config, backends)?))
}
