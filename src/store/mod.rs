//! Persistence interface consumed by the core.
//!
//! The administrative backend owns channel configs, keywords and settings; the
//! core only reads them and records tasks and webhook deliveries.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::models::{ChannelConfig, NewTask, Task, TaskTransition, TriggerKeyword, WebhookDelivery};
use crate::errors::HookError;

pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_channel_config(&self, id: &str) -> Result<Option<ChannelConfig>, HookError>;

    async fn get_channel_config_by_path(&self, path: &str) -> Result<Option<ChannelConfig>, HookError>;

    async fn list_channel_configs(&self) -> Result<Vec<ChannelConfig>, HookError>;

    /// Keywords for a project, ordered by mode then keyword.
    async fn get_trigger_keywords(&self, project_id: &str) -> Result<Vec<TriggerKeyword>, HookError>;

    async fn create_task(&self, task: NewTask) -> Result<Task, HookError>;

    /// Apply a transition through the task state machine.
    async fn update_task_status(&self, task_id: &str, transition: TaskTransition) -> Result<Task, HookError>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>, HookError>;

    /// Most recent first.
    async fn list_tasks(&self, limit: usize, offset: usize) -> Result<Vec<Task>, HookError>;

    async fn is_webhook_processed(&self, event_id: &str) -> Result<bool, HookError>;

    async fn record_webhook_delivery(&self, delivery: WebhookDelivery) -> Result<(), HookError>;

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, HookError>;
}
