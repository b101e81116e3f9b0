use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use greencart_agent::Orchestrator;
use greencart_backend::HttpCommerceApi;
use greencart_core::{AppConfig, ConfigError, LoadOptions};

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("backend client construction failed: {0}")]
    Backend(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        backend_url = %config.backend.base_url,
        "starting application bootstrap"
    );

    let backend = HttpCommerceApi::new(
        &config.backend.base_url,
        Duration::from_secs(config.backend.timeout_secs),
    )
    .map_err(|error| BootstrapError::Backend(error.to_string()))?;

    let orchestrator = Arc::new(Orchestrator::new(Arc::new(backend), &config));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "dialogue pipeline constructed"
    );

    Ok(Application { config, orchestrator })
}
