#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use hookdog::api::helpers::{WebhookResponse, ok_empty};
use hookdog::channels::{Channel, MessageSink, WebhookHandler, WebhookRequest};
use hookdog::core::models::{ChannelConfig, ChannelType, ConfigMap, NormalizedMessage, ReplyContext};
use hookdog::errors::HookError;
use serde_json::Value;

/// Sink that keeps everything it receives.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub messages: Arc<Mutex<Vec<NormalizedMessage>>>,
}

impl RecordingSink {
    pub fn received(&self) -> Vec<NormalizedMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn as_sink(&self) -> Arc<dyn MessageSink> {
        Arc::new(self.clone())
    }
}

impl MessageSink for RecordingSink {
    fn deliver(&self, message: NormalizedMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

/// Channel that records replies instead of sending them.
pub struct FakeChannel {
    pub channel_type: ChannelType,
    pub replies: Mutex<Vec<String>>,
    pub fail_replies: bool,
}

impl FakeChannel {
    pub fn new(channel_type: ChannelType) -> Self {
        Self {
            channel_type,
            replies: Mutex::new(Vec::new()),
            fail_replies: false,
        }
    }

    pub fn failing(channel_type: ChannelType) -> Self {
        Self {
            fail_replies: true,
            ..Self::new(channel_type)
        }
    }

    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for FakeChannel {
    fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    fn validate_config(&self, _config: &ConfigMap) -> Result<(), HookError> {
        Ok(())
    }

    fn build_handler(
        &self,
        _channel_config_id: &str,
        _secret: &str,
        _config: &ConfigMap,
        _sink: Arc<dyn MessageSink>,
    ) -> WebhookHandler {
        Arc::new(|_request: WebhookRequest| -> WebhookResponse { ok_empty() })
    }

    async fn send_reply(&self, _config: &ConfigMap, _message: &NormalizedMessage, text: &str) -> Result<(), HookError> {
        self.replies.lock().unwrap().push(text.to_string());
        if self.fail_replies {
            return Err(HookError::Dispatch("fake reply failure".to_string()));
        }
        Ok(())
    }
}

pub fn config_map(value: Value) -> ConfigMap {
    value.as_object().cloned().unwrap_or_default()
}

pub fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

pub fn channel_config(id: &str, project_id: &str, channel_type: ChannelType, config: Value, secret: &str, path: &str) -> ChannelConfig {
    ChannelConfig {
        id: id.to_string(),
        project_id: project_id.to_string(),
        channel_type,
        config: config_map(config),
        webhook_secret: secret.to_string(),
        webhook_path: path.to_string(),
        enabled: true,
    }
}

pub fn gitlab_message(channel_config_id: &str, body: &str) -> NormalizedMessage {
    NormalizedMessage {
        channel_type: ChannelType::GitLab,
        channel_config_id: channel_config_id.to_string(),
        project_id: String::new(),
        external_ref: "https://gitlab.example.com/group/app/-/issues/7#note_1".to_string(),
        title: "Crash on startup".to_string(),
        body: body.to_string(),
        author: "alice".to_string(),
        trigger: None,
        reply_context: ReplyContext::GitLab {
            project_id: 42,
            issue_iid: 7,
        },
        delivery: None,
    }
}
