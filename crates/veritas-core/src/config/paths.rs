//! Standard locations for configuration and model files

use std::path::PathBuf;

/// Get the default config file path
///
/// Returns: `~/.config/veritas/config.yaml` (platform config dir)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("veritas")
        .join("config.yaml")
}

/// Get the default models directory
///
/// Relative `models/` next to the working directory, matching how the
/// weights are shipped alongside the server binary.
pub fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path();
        assert!(path.ends_with("veritas/config.yaml"));
    }
}
