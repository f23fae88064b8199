use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::control::ControlSurface;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;
use crate::server::api;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub control: Arc<ControlSurface>,
}

impl AppState {
    pub async fn new(control: Arc<ControlSurface>) -> Self {
        let metrics = get_metrics().await;
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            control,
        }
    }
}

/// Control API plus, when enabled, the metrics endpoint.
pub fn router(state: AppState, settings_config: &SettingsConfig) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .merge(api::router())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn start<F>(
    settings_config: &SettingsConfig,
    control: Arc<ControlSurface>,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let metrics = get_metrics().await;
    let state = AppState::new(control).await;
    let app = router(state, settings_config);

    let address = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow!("cannot bind {}: {}", address, e))?;
    info!("http server listening on {}", address);
    metrics.up.set(1);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow!("http server failed: {}", e))?;

    metrics.up.set(0);
    Ok(())
}
