//! Aria backend server binary.
//!
//! Loads configuration from `~/.config/aria/config.toml` when present,
//! builds the session orchestrator, and serves the HTTP transport until
//! the process exits.

use anyhow::Context;
use aria::config::AssistantConfig;
use aria::session::SessionOrchestrator;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = AssistantConfig::default_config_path();
    let config = if config_path.exists() {
        tracing::info!("loading config from {}", config_path.display());
        AssistantConfig::from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        tracing::info!("no config file found, using defaults");
        AssistantConfig::default()
    };

    let orchestrator = Arc::new(
        SessionOrchestrator::new(config.clone()).context("building session orchestrator")?,
    );
    if config.speech.enabled {
        orchestrator.warm_up_speech().await;
    }

    match orchestrator.health().await {
        status if status.is_healthy() => tracing::info!("model runtime: {status}"),
        status => tracing::warn!("model runtime: {status}"),
    }

    aria::server::serve(&config.server, orchestrator)
        .await
        .context("serving HTTP transport")?;
    Ok(())
}
