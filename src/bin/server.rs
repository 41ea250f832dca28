use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use hookdog::ai::SessionClient;
use hookdog::api::server::log_channel_configs;
use hookdog::api::{AppState, serve, shutdown_signal};
use hookdog::channels::{ChannelRegistry, GitLabChannel, SlackChannel, TelegramChannel};
use hookdog::core::config::AppConfig;
use hookdog::core::settings::{self, Settings};
use hookdog::store::{MemoryStore, Store, memory};
use hookdog::worker::{Analyzer, spawn_dispatcher};

const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    hookdog::setup_logging();

    let config = AppConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("invalid environment configuration")?;

    let store: Arc<dyn Store> = match &config.seed_file {
        Some(path) => Arc::new(
            MemoryStore::from_seed_file(path)
                .with_context(|| format!("failed to load seed file {}", path.display()))?,
        ),
        None => {
            warn!("HOOKDOG_SEED_FILE not set, starting with an empty store");
            Arc::new(MemoryStore::new())
        }
    };
    info!(
        retention = memory::DEFAULT_RETENTION,
        "Store is in-memory; tasks and deliveries are lost on restart"
    );
    let tunables = Settings::new(Arc::clone(&store));

    let reply_timeout = tunables.duration(settings::REPLY_HTTP_TIMEOUT).await;
    let parse_mode = tunables.string(settings::TELEGRAM_PARSE_MODE).await;
    let registry = Arc::new(ChannelRegistry::new());
    registry.register(Arc::new(GitLabChannel::new(reply_timeout)));
    registry.register(Arc::new(SlackChannel::new(reply_timeout)));
    registry.register(Arc::new(TelegramChannel::new(reply_timeout, parse_mode)));

    let sessions = SessionClient::new(
        &config.analysis_server_url,
        &config.analysis_username,
        &config.analysis_password,
        tunables.duration(settings::ANALYSIS_TIMEOUT).await,
        tunables.duration(settings::SESSION_CLEANUP_TIMEOUT).await,
    )
    .context("failed to build analysis client")?;
    let health_wait = Duration::from_secs(tunables.u64(settings::ANALYSIS_HEALTH_WAIT_SECS).await);
    sessions.wait_until_healthy(health_wait, HEALTH_POLL_INTERVAL).await;

    let analyzer = Arc::new(Analyzer::new(Arc::clone(&store), Arc::clone(&registry), Arc::new(sessions)));
    let (queue, dispatcher) = spawn_dispatcher(analyzer, config.queue_capacity, config.worker_count);

    log_channel_configs(store.as_ref(), &registry).await;

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;
    let state = AppState {
        store,
        registry,
        queue,
    };
    serve(listener, state, shutdown_signal())
        .await
        .context("webhook server exited unexpectedly")?;

    info!("Server stopped accepting requests, draining dispatcher");
    dispatcher.shutdown(config.shutdown_timeout).await;
    info!("Shutdown complete");
    Ok(())
}
