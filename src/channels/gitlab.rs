//! Issue tracker adapter: GitLab note webhooks in, issue notes out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::signature::secrets_match;
use super::{Channel, MessageSink, WebhookHandler, WebhookRequest, config_str, reply_client, require_keys, status_error};
use crate::api::helpers::{WebhookResponse, bad_request, forbidden, method_not_allowed, ok_empty, unprocessable};
use crate::api::parsing::{decode_payload, get_header_value, parse_json_body};
use crate::core::models::{ChannelType, ConfigMap, DeliveryKey, NormalizedMessage, ReplyContext};
use crate::errors::HookError;

const TOKEN_HEADER: &str = "X-Gitlab-Token";
const EVENT_HEADER: &str = "X-Gitlab-Event";
const EVENT_UUID_HEADER: &str = "X-Gitlab-Event-UUID";
const NOTE_EVENTS: [&str; 2] = ["Note Hook", "Confidential Note Hook"];

#[derive(Debug, Deserialize)]
struct NoteEvent {
    #[serde(default)]
    project_id: Option<i64>,
    #[serde(default)]
    project: Option<ProjectInfo>,
    object_attributes: NoteAttributes,
    #[serde(default)]
    issue: Option<IssueInfo>,
    #[serde(default)]
    user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoteAttributes {
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    noteable_type: Option<String>,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueInfo {
    iid: i64,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    username: String,
}

pub struct GitLabChannel {
    http_client: HttpClient,
}

impl GitLabChannel {
    #[must_use]
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            http_client: reply_client(reply_timeout),
        }
    }
}

/// Normalize a configured base URL to the REST API root.
fn api_root(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/api/v4") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v4")
    }
}

struct HandlerContext {
    channel_config_id: String,
    secret: String,
    bot_username: String,
    sink: Arc<dyn MessageSink>,
}

impl HandlerContext {
    fn handle(&self, request: &WebhookRequest) -> WebhookResponse {
        if request.method != Method::POST {
            return method_not_allowed();
        }

        let token = get_header_value(&request.headers, TOKEN_HEADER).unwrap_or_default();
        if !secrets_match(&self.secret, token) {
            warn!(channel_config_id = %self.channel_config_id, "GitLab webhook token mismatch");
            return forbidden();
        }

        let event_type = get_header_value(&request.headers, EVENT_HEADER).unwrap_or_default();
        if !NOTE_EVENTS.contains(&event_type) {
            debug!(event_type, "Ignoring non-note GitLab event");
            return ok_empty();
        }

        let value = match parse_json_body(&request.body) {
            Ok(value) => value,
            Err(e) => {
                warn!(channel_config_id = %self.channel_config_id, error = %e, "Rejecting GitLab webhook body");
                return bad_request();
            }
        };
        let event: NoteEvent = match decode_payload(value) {
            Ok(event) => event,
            Err(e) => {
                warn!(channel_config_id = %self.channel_config_id, error = %e, "GitLab note payload not recognised");
                return unprocessable();
            }
        };

        if let Some(message) = self.extract(event, &request.headers, event_type, &request.body) {
            info!(
                channel_config_id = %self.channel_config_id,
                external_ref = %message.external_ref,
                author = %message.author,
                "Accepted GitLab issue note"
            );
            self.sink.deliver(message);
        }
        ok_empty()
    }

    fn extract(&self, event: NoteEvent, headers: &HeaderMap, event_type: &str, raw: &[u8]) -> Option<NormalizedMessage> {
        let attrs = event.object_attributes;
        if attrs.noteable_type.as_deref() != Some("Issue") {
            debug!(noteable_type = ?attrs.noteable_type, "Ignoring note on non-issue");
            return None;
        }
        if attrs.system {
            debug!("Ignoring system note");
            return None;
        }
        let author = event.user.map(|u| u.username).unwrap_or_default();
        if !self.bot_username.is_empty() && author == self.bot_username {
            debug!(author = %author, "Ignoring note from own bot account");
            return None;
        }
        let Some(issue) = event.issue else {
            warn!("Issue note without issue attributes");
            return None;
        };
        let project_web_url = event.project.as_ref().and_then(|p| p.web_url.clone()).unwrap_or_default();
        let Some(project_id) = event.project_id.or_else(|| event.project.as_ref().and_then(|p| p.id)) else {
            warn!("Issue note without project id");
            return None;
        };

        let external_ref = match attrs.url.filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => format!("{project_web_url}/-/issues/{}", issue.iid),
        };

        Some(NormalizedMessage {
            channel_type: ChannelType::GitLab,
            channel_config_id: self.channel_config_id.clone(),
            project_id: String::new(),
            external_ref,
            title: issue.title.unwrap_or_default(),
            body: attrs.note.unwrap_or_default(),
            author,
            trigger: None,
            reply_context: ReplyContext::GitLab {
                project_id,
                issue_iid: issue.iid,
            },
            delivery: get_header_value(headers, EVENT_UUID_HEADER).map(|id| DeliveryKey::new(id, event_type, raw)),
        })
    }
}

#[async_trait]
impl Channel for GitLabChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::GitLab
    }

    fn validate_config(&self, config: &ConfigMap) -> Result<(), HookError> {
        require_keys(config, &["base_url", "token"])
    }

    fn build_handler(
        &self,
        channel_config_id: &str,
        secret: &str,
        config: &ConfigMap,
        sink: Arc<dyn MessageSink>,
    ) -> WebhookHandler {
        let ctx = HandlerContext {
            channel_config_id: channel_config_id.to_string(),
            secret: secret.to_string(),
            bot_username: config_str(config, "bot_username").to_string(),
            sink,
        };
        Arc::new(move |request: WebhookRequest| ctx.handle(&request))
    }

    async fn send_reply(&self, config: &ConfigMap, message: &NormalizedMessage, text: &str) -> Result<(), HookError> {
        require_keys(config, &["base_url", "token"])?;
        let ReplyContext::GitLab { project_id, issue_iid } = &message.reply_context else {
            return Err(HookError::Dispatch("reply context is not a GitLab issue".to_string()));
        };

        let url = format!(
            "{}/projects/{project_id}/issues/{issue_iid}/notes",
            api_root(config_str(config, "base_url"))
        );
        let response = self
            .http_client
            .post(&url)
            .header("PRIVATE-TOKEN", config_str(config, "token"))
            .json(&json!({ "body": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(ChannelType::GitLab, response).await);
        }
        info!(project_id, issue_iid, "Posted GitLab issue note");
        Ok(())
    }
}
