//! YAML configuration loading and saving

use anyhow::{Context, Result};
use std::path::Path;

use super::ServiceConfig;

/// Load the service configuration from a YAML file
///
/// A missing file yields the defaults. An unreadable or invalid file logs a
/// warning and also yields the defaults, so a typo never keeps the server
/// from starting. Values are clamped via [`ServiceConfig::validate`].
pub fn load_config(path: &Path) -> ServiceConfig {
    log::info!("load_config: Loading from {:?}", path);

    let mut config = if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        ServiceConfig::default()
    } else {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<ServiceConfig>(&contents) {
                Ok(config) => {
                    log::info!("load_config: Successfully loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                    ServiceConfig::default()
                }
            },
            Err(e) => {
                log::warn!(
                    "load_config: Failed to read config file: {}, using defaults",
                    e
                );
                ServiceConfig::default()
            }
        }
    };

    config.validate();
    config
}

/// Save the service configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved successfully");
    Ok(())
}
