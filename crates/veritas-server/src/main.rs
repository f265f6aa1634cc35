//! Veritas Server - HTTP API for video and audio deepfake detection
//!
//! ## Command line flags
//!
//! - `--config <path>`: configuration file (default: `VERITAS_CONFIG`, then
//!   the per-user config directory)
//!
//! ## Environment
//!
//! - `HOST`, `PORT`: bind address overrides
//! - `FRONTEND_URL`: extra CORS origin for the production frontend
//! - `RUST_LOG`: log filter (default `info`)

mod api;
mod error;
mod state;

use std::path::PathBuf;

use anyhow::Context;
use tokio::signal;
use veritas_core::config::{default_config_path, load_config, ServiceConfig};
use veritas_core::PredictionGateway;

use state::AppState;

/// Pick the configuration file: `--config` flag, then `VERITAS_CONFIG`, then
/// the default location
fn config_path(args: &[String], env_path: Option<String>) -> PathBuf {
    args.iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .or_else(|| env_path.filter(|p| !p.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

/// Apply `HOST`, `PORT` and `FRONTEND_URL` on top of the loaded file
fn apply_env_overrides(config: &mut ServiceConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("HOST").map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) {
        config.server.host = host;
    }
    if let Some(raw) = var("PORT") {
        match raw.trim().parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => log::warn!("Invalid PORT='{}', keeping {}", raw, config.server.port),
        }
    }
    if let Some(url) = var("FRONTEND_URL").map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
        config.server.frontend_url = Some(url);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for per-frame and per-chunk output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let path = config_path(&args, std::env::var("VERITAS_CONFIG").ok());
    let mut config = load_config(&path);
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate();

    log::info!("veritas-server {} starting up", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration: {:?}", path);
    log::info!("Models directory: {:?}", config.models.dir);
    log::info!("Device preference: {:?}", config.models.device);
    log::info!("CORS origins: {:?}", config.server.cors_origins());

    let gateway = PredictionGateway::new(&config);
    let models = gateway.models();
    if models.total == 0 {
        log::warn!("No video models found in {:?}", config.models.dir);
    } else {
        log::info!("{} video model(s) available", models.total);
    }

    let app = api::create_router(AppState::new(gateway), &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    log::info!("veritas-server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_config_path_precedence() {
        let flag = config_path(
            &args(&["veritas-server", "--config", "/etc/veritas.yaml"]),
            Some("/tmp/env.yaml".into()),
        );
        assert_eq!(flag, PathBuf::from("/etc/veritas.yaml"));

        let env = config_path(&args(&["veritas-server"]), Some("/tmp/env.yaml".into()));
        assert_eq!(env, PathBuf::from("/tmp/env.yaml"));

        let fallback = config_path(&args(&["veritas-server", "--config"]), None);
        assert_eq!(fallback, default_config_path());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("FRONTEND_URL", "https://veritas.example.com"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert!(config
            .server
            .cors_origins()
            .contains(&"https://veritas.example.com".to_string()));
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, |k| (k == "PORT").then(|| "http".to_string()));
        assert_eq!(config.server.port, 8000);
    }
}
