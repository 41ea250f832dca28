//! Team chat adapter: Slack Events API in, threaded `chat.postMessage` out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::signature::{timestamp_is_fresh, verify_slack_signature};
use super::{Channel, MessageSink, WebhookHandler, WebhookRequest, config_str, reply_client, require_keys, status_error};
use crate::api::helpers::{WebhookResponse, bad_request, forbidden, method_not_allowed, ok_empty, ok_json};
use crate::api::parsing::{decode_payload, get_header_value, parse_json_body};
use crate::core::models::{ChannelType, ConfigMap, DeliveryKey, NormalizedMessage, ReplyContext};
use crate::errors::HookError;

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

const SIGNATURE_HEADER: &str = "X-Slack-Signature";
const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    challenge: String,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    event: Option<InnerEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct InnerEvent {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackChannel {
    http_client: HttpClient,
    api_base_url: String,
}

impl SlackChannel {
    #[must_use]
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            http_client: reply_client(reply_timeout),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// Point replies at a different Web API root.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn tolerance_from(config: &ConfigMap) -> i64 {
    match config.get("timestamp_tolerance_secs") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(DEFAULT_TIMESTAMP_TOLERANCE_SECS),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_TIMESTAMP_TOLERANCE_SECS),
        _ => DEFAULT_TIMESTAMP_TOLERANCE_SECS,
    }
}

struct HandlerContext {
    channel_config_id: String,
    signing_secret: String,
    tolerance_secs: i64,
    sink: Arc<dyn MessageSink>,
}

impl HandlerContext {
    fn verify(&self, request: &WebhookRequest) -> bool {
        if self.signing_secret.is_empty() {
            warn!(channel_config_id = %self.channel_config_id, "No Slack signing secret configured, rejecting");
            return false;
        }
        let (Some(timestamp), Some(signature)) = (
            get_header_value(&request.headers, TIMESTAMP_HEADER),
            get_header_value(&request.headers, SIGNATURE_HEADER),
        ) else {
            warn!(channel_config_id = %self.channel_config_id, "Missing Slack signature headers");
            return false;
        };
        if !timestamp_is_fresh(timestamp, self.tolerance_secs, chrono::Utc::now().timestamp()) {
            return false;
        }
        verify_slack_signature(&request.body, timestamp, signature, &self.signing_secret)
    }

    fn handle(&self, request: &WebhookRequest) -> WebhookResponse {
        if request.method != Method::POST {
            return method_not_allowed();
        }
        if !self.verify(request) {
            warn!(channel_config_id = %self.channel_config_id, "Slack signature verification failed");
            return forbidden();
        }

        let value = match parse_json_body(&request.body) {
            Ok(value) => value,
            Err(e) => {
                warn!(channel_config_id = %self.channel_config_id, error = %e, "Rejecting Slack webhook body");
                return bad_request();
            }
        };
        let envelope: Envelope = match decode_payload(value) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(channel_config_id = %self.channel_config_id, error = %e, "Slack payload not recognised");
                return bad_request();
            }
        };

        if envelope.kind == "url_verification" {
            info!(channel_config_id = %self.channel_config_id, "Answering Slack URL verification");
            return ok_json(json!({ "challenge": envelope.challenge }));
        }

        if let Some(message) = self.extract(envelope, &request.body) {
            info!(
                channel_config_id = %self.channel_config_id,
                external_ref = %message.external_ref,
                author = %message.author,
                "Accepted Slack message"
            );
            self.sink.deliver(message);
        }
        ok_empty()
    }

    fn extract(&self, envelope: Envelope, raw: &[u8]) -> Option<NormalizedMessage> {
        if envelope.kind != "event_callback" {
            debug!(kind = %envelope.kind, "Ignoring Slack envelope");
            return None;
        }
        let event = envelope.event?;
        if event.kind != "message" && event.kind != "app_mention" {
            debug!(kind = %event.kind, "Ignoring Slack event type");
            return None;
        }
        if event.bot_id.is_some() {
            debug!("Ignoring bot-authored Slack message");
            return None;
        }
        let user = event.user.filter(|u| !u.is_empty())?;

        let channel = event.channel.unwrap_or_default();
        let ts = event.ts.unwrap_or_default();
        let thread_ts = event.thread_ts.filter(|t| !t.is_empty()).unwrap_or_else(|| ts.clone());

        Some(NormalizedMessage {
            channel_type: ChannelType::Slack,
            channel_config_id: self.channel_config_id.clone(),
            project_id: String::new(),
            external_ref: format!("slack://{channel}/{ts}"),
            title: format!("Slack message in #{channel}"),
            body: event.text.unwrap_or_default(),
            author: user,
            trigger: None,
            reply_context: ReplyContext::Slack { channel, thread_ts },
            delivery: envelope
                .event_id
                .filter(|id| !id.is_empty())
                .map(|id| DeliveryKey::new(id, event.kind, raw)),
        })
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Slack
    }

    fn validate_config(&self, config: &ConfigMap) -> Result<(), HookError> {
        require_keys(config, &["bot_token", "signing_secret"])
    }

    fn build_handler(
        &self,
        channel_config_id: &str,
        secret: &str,
        config: &ConfigMap,
        sink: Arc<dyn MessageSink>,
    ) -> WebhookHandler {
        let signing_secret = match config_str(config, "signing_secret") {
            "" => secret,
            configured => configured,
        };
        let ctx = HandlerContext {
            channel_config_id: channel_config_id.to_string(),
            signing_secret: signing_secret.to_string(),
            tolerance_secs: tolerance_from(config),
            sink,
        };
        Arc::new(move |request: WebhookRequest| ctx.handle(&request))
    }

    async fn send_reply(&self, config: &ConfigMap, message: &NormalizedMessage, text: &str) -> Result<(), HookError> {
        require_keys(config, &["bot_token"])?;
        let ReplyContext::Slack { channel, thread_ts } = &message.reply_context else {
            return Err(HookError::Dispatch("reply context is not a Slack thread".to_string()));
        };

        let response = self
            .http_client
            .post(format!("{}/chat.postMessage", self.api_base_url))
            .bearer_auth(config_str(config, "bot_token"))
            .json(&json!({
                "channel": channel,
                "thread_ts": thread_ts,
                "text": text,
                "mrkdwn": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(ChannelType::Slack, response).await);
        }
        let result: ApiResult = response.json().await?;
        if !result.ok {
            return Err(HookError::Dispatch(format!(
                "slack api error: {}",
                result.error.unwrap_or_else(|| "unknown".to_string())
            )));
        }
        info!(channel = %channel, thread_ts = %thread_ts, "Posted Slack thread reply");
        Ok(())
    }
}
