use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::errors::HookError;

/// Free-form per-channel configuration (tokens, secrets, base URLs).
pub type ConfigMap = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    GitLab,
    Slack,
    Telegram,
}

impl ChannelType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::GitLab => "gitlab",
            ChannelType::Slack => "slack",
            ChannelType::Telegram => "telegram",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gitlab" => Ok(ChannelType::GitLab),
            "slack" => Ok(ChannelType::Slack),
            "telegram" => Ok(ChannelType::Telegram),
            other => Err(HookError::Parse(format!("unknown channel type: {other}"))),
        }
    }
}

/// Analysis style requested by a trigger keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerMode {
    Ask,
    Plan,
    Do,
    Other(String),
}

impl TriggerMode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            TriggerMode::Ask => "ask",
            TriggerMode::Plan => "plan",
            TriggerMode::Do => "do",
            TriggerMode::Other(mode) => mode,
        }
    }
}

impl From<&str> for TriggerMode {
    fn from(value: &str) -> Self {
        match value {
            "ask" => TriggerMode::Ask,
            "plan" => TriggerMode::Plan,
            "do" => TriggerMode::Do,
            other => TriggerMode::Other(other.to_string()),
        }
    }
}

impl From<String> for TriggerMode {
    fn from(value: String) -> Self {
        TriggerMode::from(value.as_str())
    }
}

impl From<TriggerMode> for String {
    fn from(mode: TriggerMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerKeyword {
    pub project_id: String,
    pub keyword: String,
    pub mode: TriggerMode,
}

impl TriggerKeyword {
    #[must_use]
    pub fn new(project_id: &str, keyword: &str, mode: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            keyword: keyword.to_string(),
            mode: TriggerMode::from(mode),
        }
    }
}

/// The keyword that fired and the mode it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub keyword: String,
    pub mode: TriggerMode,
}

fn default_enabled() -> bool {
    true
}

/// Channel configuration owned by the administrative layer; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub project_id: String,
    pub channel_type: ChannelType,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub webhook_secret: String,
    pub webhook_path: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Channel-specific addressing for replying in place.
///
/// Only the adapter that produced a variant should destructure it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyContext {
    GitLab { project_id: i64, issue_iid: i64 },
    Slack { channel: String, thread_ts: String },
    Telegram { chat_id: i64, message_id: i64 },
}

/// Identity of one webhook delivery, used by the optional dedup gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryKey {
    pub event_id: String,
    pub event_type: String,
    pub payload_hash: String,
}

impl DeliveryKey {
    #[must_use]
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>, body: &[u8]) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload_hash: hex::encode(Sha256::digest(body)),
        }
    }
}

/// Channel-agnostic representation of an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub channel_type: ChannelType,
    pub channel_config_id: String,
    pub project_id: String,
    pub external_ref: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub trigger: Option<KeywordMatch>,
    pub reply_context: ReplyContext,
    pub delivery: Option<DeliveryKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    #[must_use]
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested status change; the only way a task is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTransition {
    Processing,
    Completed { result: String },
    Failed { error: String },
}

impl TaskTransition {
    #[must_use]
    pub fn target(&self) -> TaskStatus {
        match self {
            TaskTransition::Processing => TaskStatus::Processing,
            TaskTransition::Completed { .. } => TaskStatus::Completed,
            TaskTransition::Failed { .. } => TaskStatus::Failed,
        }
    }
}

/// Fields for a task about to be created in `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub project_id: Option<String>,
    pub channel_config_id: Option<String>,
    pub channel_type: ChannelType,
    pub mode: TriggerMode,
    pub keyword: String,
    pub external_ref: String,
    pub title: String,
    pub body: String,
    pub author: String,
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl NewTask {
    #[must_use]
    pub fn from_message(message: &NormalizedMessage, matched: &KeywordMatch) -> Self {
        Self {
            project_id: non_empty(&message.project_id),
            channel_config_id: non_empty(&message.channel_config_id),
            channel_type: message.channel_type,
            mode: matched.mode.clone(),
            keyword: matched.keyword.clone(),
            external_ref: message.external_ref.clone(),
            title: message.title.clone(),
            body: message.body.clone(),
            author: message.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: Option<String>,
    pub channel_config_id: Option<String>,
    pub channel_type: ChannelType,
    pub mode: TriggerMode,
    pub keyword: String,
    pub external_ref: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    #[must_use]
    pub fn new(id: String, fields: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            project_id: fields.project_id,
            channel_config_id: fields.channel_config_id,
            channel_type: fields.channel_type,
            mode: fields.mode,
            keyword: fields.keyword,
            external_ref: fields.external_ref,
            title: fields.title,
            body: fields.body,
            author: fields.author,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply a status transition.
    ///
    /// # Errors
    ///
    /// Returns `HookError::InvalidTransition` for anything other than
    /// `pending -> processing -> completed | failed`.
    pub fn apply(&mut self, transition: TaskTransition, now: DateTime<Utc>) -> Result<(), HookError> {
        let next = transition.target();
        if !self.status.can_transition_to(next) {
            return Err(HookError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match transition {
            TaskTransition::Processing => self.started_at = Some(now),
            TaskTransition::Completed { result } => {
                self.result = Some(result);
                self.completed_at = Some(now);
            }
            TaskTransition::Failed { error } => {
                self.error = Some(error);
                self.completed_at = Some(now);
            }
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub event_id: String,
    pub event_type: String,
    pub payload_hash: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookDelivery {
    #[must_use]
    pub fn from_key(key: &DeliveryKey, now: DateTime<Utc>) -> Self {
        Self {
            event_id: key.event_id.clone(),
            event_type: key.event_type.clone(),
            payload_hash: key.payload_hash.clone(),
            processed: true,
            created_at: now,
        }
    }
}
