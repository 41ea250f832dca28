//! Webhook HTTP server and request helpers

pub mod helpers;
pub mod parsing;
pub mod server;

pub use server::{AppState, build_router, serve, shutdown_signal};
