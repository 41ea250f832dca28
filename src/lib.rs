//! Hookdog - a webhook gateway that turns chat and issue-tracker mentions into
//! AI analysis tasks and posts the results back where they were asked.
//!
//! # Architecture
//!
//! - `channels`: one adapter per channel type (GitLab issues, Slack, Telegram)
//!   that verifies and normalizes inbound webhooks and posts replies
//! - `api`: the axum server that routes each configured webhook path to its
//!   adapter and answers without waiting for analysis
//! - `worker`: a bounded queue and worker pool running the analyzer, which
//!   matches trigger keywords, tracks tasks, and drives the analysis session
//! - `ai`: the analysis service session client
//! - `store`: the persistence interface and an in-memory implementation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use hookdog::ai::SessionClient;
//! use hookdog::channels::{ChannelRegistry, GitLabChannel};
//! use hookdog::store::MemoryStore;
//! use hookdog::worker::{Analyzer, spawn_dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     hookdog::setup_logging();
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let registry = Arc::new(ChannelRegistry::new());
//!     registry.register(Arc::new(GitLabChannel::new(Duration::from_secs(30))));
//!
//!     let sessions = SessionClient::new(
//!         "http://127.0.0.1:4096",
//!         "opencode",
//!         "",
//!         Duration::from_secs(300),
//!         Duration::from_secs(10),
//!     )?;
//!     let analyzer = Arc::new(Analyzer::new(store, registry, Arc::new(sessions)));
//!     let (queue, dispatcher) = spawn_dispatcher(analyzer, 256, 8);
//!     drop(queue);
//!     dispatcher.shutdown(Duration::from_secs(1)).await;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod ai;
pub mod api;
pub mod channels;
pub mod core;
pub mod errors;
pub mod prompt;
pub mod store;
pub mod worker;

/// Configure structured JSON logging.
///
/// The filter comes from `RUST_LOG` and defaults to `info` (`debug` with the
/// `debug-logs` feature). Safe to call more than once; later calls are no-ops.
///
/// # Example
///
/// ```
/// hookdog::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let default_level = if cfg!(feature = "debug-logs") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}
