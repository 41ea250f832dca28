//! Bot chat adapter: Telegram Bot API updates in, `sendMessage` replies out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::signature::secrets_match;
use super::{Channel, MessageSink, WebhookHandler, WebhookRequest, config_str, reply_client, require_keys};
use crate::api::helpers::{WebhookResponse, bad_request, forbidden, method_not_allowed, ok_empty};
use crate::api::parsing::{decode_payload, get_header_value, parse_json_body};
use crate::core::models::{ChannelType, ConfigMap, DeliveryKey, NormalizedMessage, ReplyContext};
use crate::errors::HookError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    update_id: Option<i64>,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    #[serde(default)]
    from: Option<User>,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramChannel {
    http_client: HttpClient,
    api_base_url: String,
    parse_mode: String,
}

impl TelegramChannel {
    #[must_use]
    pub fn new(reply_timeout: Duration, parse_mode: impl Into<String>) -> Self {
        Self {
            http_client: reply_client(reply_timeout),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            parse_mode: parse_mode.into(),
        }
    }

    /// Point replies at a different Bot API root.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

struct HandlerContext {
    channel_config_id: String,
    secret: String,
    sink: Arc<dyn MessageSink>,
}

impl HandlerContext {
    fn handle(&self, request: &WebhookRequest) -> WebhookResponse {
        if request.method != Method::POST {
            return method_not_allowed();
        }

        if !self.secret.is_empty() {
            let token = get_header_value(&request.headers, SECRET_HEADER).unwrap_or_default();
            if !secrets_match(&self.secret, token) {
                warn!(channel_config_id = %self.channel_config_id, "Telegram secret token mismatch");
                return forbidden();
            }
        }

        let update: Update = match parse_json_body(&request.body).and_then(decode_payload) {
            Ok(update) => update,
            Err(e) => {
                warn!(channel_config_id = %self.channel_config_id, error = %e, "Rejecting Telegram update");
                return bad_request();
            }
        };

        if let Some(message) = self.extract(update, &request.body) {
            info!(
                channel_config_id = %self.channel_config_id,
                external_ref = %message.external_ref,
                author = %message.author,
                "Accepted Telegram message"
            );
            self.sink.deliver(message);
        }
        ok_empty()
    }

    fn extract(&self, update: Update, raw: &[u8]) -> Option<NormalizedMessage> {
        let Some(message) = update.message else {
            debug!("Ignoring Telegram update without message");
            return None;
        };
        let text = message.text.filter(|t| !t.is_empty())?;

        let chat_id = message.chat.id;
        let title = match message.chat.title.filter(|t| !t.is_empty()) {
            Some(title) => title,
            None => format!("Chat {chat_id}"),
        };

        Some(NormalizedMessage {
            channel_type: ChannelType::Telegram,
            channel_config_id: self.channel_config_id.clone(),
            project_id: String::new(),
            external_ref: format!("tg://chat/{chat_id}/msg/{}", message.message_id),
            title,
            body: text,
            author: message.from.and_then(|u| u.username).unwrap_or_default(),
            trigger: None,
            reply_context: ReplyContext::Telegram {
                chat_id,
                message_id: message.message_id,
            },
            delivery: update
                .update_id
                .map(|id| DeliveryKey::new(id.to_string(), "message", raw)),
        })
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Telegram
    }

    fn validate_config(&self, config: &ConfigMap) -> Result<(), HookError> {
        require_keys(config, &["bot_token"])
    }

    fn build_handler(
        &self,
        channel_config_id: &str,
        secret: &str,
        _config: &ConfigMap,
        sink: Arc<dyn MessageSink>,
    ) -> WebhookHandler {
        let ctx = HandlerContext {
            channel_config_id: channel_config_id.to_string(),
            secret: secret.to_string(),
            sink,
        };
        Arc::new(move |request: WebhookRequest| ctx.handle(&request))
    }

    async fn send_reply(&self, config: &ConfigMap, message: &NormalizedMessage, text: &str) -> Result<(), HookError> {
        require_keys(config, &["bot_token"])?;
        let ReplyContext::Telegram { chat_id, message_id } = &message.reply_context else {
            return Err(HookError::Dispatch("reply context is not a Telegram chat".to_string()));
        };

        // The bot token is part of the path; errors must not carry the URL.
        let url = format!("{}/bot{}/sendMessage", self.api_base_url, config_str(config, "bot_token"));
        let response = self
            .http_client
            .post(url)
            .json(&json!({
                "chat_id": chat_id,
                "reply_to_message_id": message_id,
                "text": text,
                "parse_mode": self.parse_mode,
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let result: ApiResult = match response.json().await {
            Ok(result) => result,
            Err(e) if status.is_success() => return Err(e.without_url().into()),
            Err(_) => {
                return Err(HookError::Dispatch(format!("telegram reply failed: status={status}")));
            }
        };
        if !result.ok {
            return Err(HookError::Dispatch(format!(
                "telegram api error: {}",
                result.description.unwrap_or_else(|| status.to_string())
            )));
        }
        info!(chat_id, message_id, "Posted Telegram reply");
        Ok(())
    }
}
