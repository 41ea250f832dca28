//! Inbound webhook adapters and outbound reply senders, one per channel type.

pub mod gitlab;
pub mod registry;
pub mod signature;
pub mod slack;
pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use serde_json::Value;
use tracing::warn;

use crate::api::helpers::WebhookResponse;
use crate::core::models::{ChannelType, ConfigMap, NormalizedMessage};
use crate::errors::HookError;

pub use gitlab::GitLabChannel;
pub use registry::ChannelRegistry;
pub use slack::SlackChannel;
pub use telegram::TelegramChannel;

/// The parts of an HTTP request a webhook handler looks at.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WebhookRequest {
    #[must_use]
    pub fn post(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            headers,
            body: body.into(),
        }
    }
}

/// Synchronous request-to-response closure built per channel config.
pub type WebhookHandler = Arc<dyn Fn(WebhookRequest) -> WebhookResponse + Send + Sync>;

/// Receives extracted messages. Implementations must hand off without
/// blocking; dispatch never runs inside the webhook request.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, message: NormalizedMessage);
}

impl<F> MessageSink for F
where
    F: Fn(NormalizedMessage) + Send + Sync,
{
    fn deliver(&self, message: NormalizedMessage) {
        self(message);
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn channel_type(&self) -> ChannelType;

    /// Check that every key the adapter needs is present and non-empty.
    fn validate_config(&self, config: &ConfigMap) -> Result<(), HookError>;

    fn build_handler(
        &self,
        channel_config_id: &str,
        secret: &str,
        config: &ConfigMap,
        sink: Arc<dyn MessageSink>,
    ) -> WebhookHandler;

    /// Post `text` back to where `message` came from.
    async fn send_reply(&self, config: &ConfigMap, message: &NormalizedMessage, text: &str) -> Result<(), HookError>;
}

/// String value of a config key; empty when absent or not a string.
#[must_use]
pub fn config_str<'a>(config: &'a ConfigMap, key: &str) -> &'a str {
    config.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Fails on the first key that is missing or empty.
pub fn require_keys(config: &ConfigMap, keys: &[&str]) -> Result<(), HookError> {
    for key in keys {
        if config_str(config, key).is_empty() {
            return Err(HookError::ConfigMissing(format!("missing required field: {key}")));
        }
    }
    Ok(())
}

fn build_reply_client(timeout: Duration) -> Result<reqwest::Client, HookError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HookError::Http(format!("Failed to build reply HTTP client: {e}")))
}

/// HTTP client for outbound replies with a fixed request timeout.
///
/// Falls back to a default client, logged, if the builder fails.
pub(crate) fn reply_client(timeout: Duration) -> reqwest::Client {
    build_reply_client(timeout).unwrap_or_else(|e| {
        warn!(error = %e, ?timeout, "Reply timeout not applied, using default HTTP client");
        reqwest::Client::new()
    })
}

/// Read a failed response into a dispatch error carrying status and body.
pub(crate) async fn status_error(channel: ChannelType, response: reqwest::Response) -> HookError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    HookError::Dispatch(format!("{channel} reply failed: status={status} body={body}"))
}
