use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde_json::json;
use tracing::{info, warn};

use crate::cache::token_source::TokenSource;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;

pub struct AppState<T> {
    pub source: Arc<T>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone() }
    }
}

/// `/token`, `/health` and, when enabled, the metrics path.
pub async fn router<T: TokenSource + 'static>(settings_config: &SettingsConfig, source: Arc<T>) -> Router {
    let metrics = get_metrics().await;
    let metrics_state = MetricsState::new(metrics.registry.clone());

    Router::new()
        .route("/token", get(get_token::<T>))
        .route("/health", get(health))
        .with_state(AppState { source })
        .merge(metrics_state.router::<()>(&settings_config.metrics))
}

/// Serve until the process is stopped.
pub async fn start<T: TokenSource + 'static>(settings_config: &SettingsConfig, source: Arc<T>) -> Result<()> {
    let app = router(settings_config, source).await;

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind '{}'", bind_addr))?;
    info!("listening on {}", bind_addr);

    get_metrics().await.up.set(1);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn get_token<T: TokenSource + 'static>(State(state): State<AppState<T>>) -> Response {
    match state.source.token().await {
        Ok(token) => (StatusCode::OK, Json(token)).into_response(),
        Err(err) => {
            warn!(error = %err, "token request could not be served");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
