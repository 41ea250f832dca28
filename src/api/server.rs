//! HTTP surface: health check plus one dynamic webhook route per channel config.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::helpers::{WebhookResponse, err_response};
use crate::channels::{ChannelRegistry, MessageSink, WebhookRequest};
use crate::core::models::{ChannelConfig, NormalizedMessage};
use crate::store::Store;
use crate::worker::DispatchQueue;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<ChannelRegistry>,
    pub queue: DispatchQueue,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(handle_webhook)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn find_config(store: &dyn Store, path: &str) -> Result<Option<ChannelConfig>, WebhookResponse> {
    match store.get_channel_config_by_path(path).await {
        Ok(Some(config)) => Ok(Some(config)),
        Ok(None) if path.starts_with('/') => store
            .get_channel_config_by_path(path.trim_start_matches('/'))
            .await
            .map_err(|e| {
                error!(error = %e, "Channel config lookup failed");
                err_response(StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
            }),
        Ok(None) => Ok(None),
        Err(e) => {
            error!(error = %e, "Channel config lookup failed");
            Err(err_response(StatusCode::SERVICE_UNAVAILABLE, "store unavailable"))
        }
    }
}

/// Sink that stamps the owning config onto each message before queueing it.
fn queue_sink(queue: DispatchQueue, config: &ChannelConfig) -> Arc<dyn MessageSink> {
    let project_id = config.project_id.clone();
    let channel_config_id = config.id.clone();
    Arc::new(move |mut message: NormalizedMessage| {
        message.project_id.clone_from(&project_id);
        message.channel_config_id.clone_from(&channel_config_id);
        queue.enqueue(message);
    })
}

#[tracing::instrument(level = "info", skip(state, headers, body), fields(path = %uri.path()))]
async fn handle_webhook(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResponse {
    let config = match find_config(state.store.as_ref(), uri.path()).await {
        Ok(Some(config)) if config.enabled => config,
        Ok(Some(_)) => {
            info!("Webhook path belongs to a disabled channel config");
            return err_response(StatusCode::NOT_FOUND, "not found");
        }
        Ok(None) => return err_response(StatusCode::NOT_FOUND, "not found"),
        Err(response) => return response,
    };

    let Some(channel) = state.registry.get(config.channel_type) else {
        error!(channel_type = %config.channel_type, "No adapter registered for channel type");
        return err_response(StatusCode::INTERNAL_SERVER_ERROR, "unknown channel");
    };

    let sink = queue_sink(state.queue.clone(), &config);
    let handler = channel.build_handler(&config.id, &config.webhook_secret, &config.config, sink);
    let response = handler(WebhookRequest { method, headers, body });
    info!(
        channel_config_id = %config.id,
        status = response.status.as_u16(),
        "Webhook handled"
    );
    response
}

/// Log every stored channel config and flag incomplete ones.
pub async fn log_channel_configs(store: &dyn Store, registry: &ChannelRegistry) {
    let configs = match store.list_channel_configs().await {
        Ok(configs) => configs,
        Err(e) => {
            warn!(error = %e, "Failed to list channel configs");
            return;
        }
    };
    for config in configs {
        let Some(channel) = registry.get(config.channel_type) else {
            warn!(channel_type = %config.channel_type, path = %config.webhook_path, "Unknown channel type");
            continue;
        };
        if let Err(e) = channel.validate_config(&config.config) {
            warn!(channel_config_id = %config.id, error = %e, "Channel config is incomplete");
        }
        info!(
            path = %config.webhook_path,
            channel_type = %config.channel_type,
            project_id = %config.project_id,
            enabled = config.enabled,
            "Webhook route available"
        );
    }
}

/// Serve until `shutdown` resolves, then stop accepting connections.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Webhook server listening");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on ctrl-c or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
