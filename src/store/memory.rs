use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::Store;
use crate::core::models::{
    ChannelConfig, NewTask, Task, TaskTransition, TriggerKeyword, WebhookDelivery,
};
use crate::errors::HookError;

/// Contents of a seed file for [`MemoryStore::from_seed_file`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub channel_configs: Vec<ChannelConfig>,
    pub trigger_keywords: Vec<TriggerKeyword>,
    pub settings: HashMap<String, Value>,
}

#[derive(Default)]
struct Inner {
    channel_configs: HashMap<String, ChannelConfig>,
    keywords: HashMap<String, Vec<TriggerKeyword>>,
    tasks: Vec<Task>,
    deliveries: HashMap<String, WebhookDelivery>,
    delivery_order: VecDeque<String>,
    settings: HashMap<String, Value>,
}

/// Tasks and delivery records kept before the oldest are evicted.
pub const DEFAULT_RETENTION: usize = 10_000;

/// In-process [`Store`]; writes are serialized behind one lock.
///
/// Nothing survives a restart. Finished tasks and delivery records beyond
/// the retention count are evicted oldest first; pending and processing
/// tasks are never evicted.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    retention: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    #[must_use]
    pub fn from_seed(seed: SeedData) -> Self {
        let store = Self::new();
        for config in seed.channel_configs {
            store.insert_channel_config(config);
        }

        let mut by_project: HashMap<String, Vec<TriggerKeyword>> = HashMap::new();
        for keyword in seed.trigger_keywords {
            by_project
                .entry(keyword.project_id.clone())
                .or_default()
                .push(keyword);
        }
        for (project_id, keywords) in by_project {
            store.set_trigger_keywords(&project_id, keywords);
        }

        for (key, value) in seed.settings {
            store.set_setting(&key, value);
        }
        store
    }

    /// Load a JSON seed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid seed JSON.
    pub fn from_seed_file(path: &Path) -> Result<Self, HookError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| HookError::Store(format!("read {}: {e}", path.display())))?;
        let seed: SeedData = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            channel_configs = seed.channel_configs.len(),
            trigger_keywords = seed.trigger_keywords.len(),
            settings = seed.settings.len(),
            "Loaded store seed file"
        );
        Ok(Self::from_seed(seed))
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_channel_config(&self, config: ChannelConfig) {
        self.write()
            .channel_configs
            .insert(config.id.clone(), config);
    }

    /// Replace a project's keywords. A repeated keyword keeps its last mode.
    pub fn set_trigger_keywords(&self, project_id: &str, keywords: Vec<TriggerKeyword>) {
        let mut unique: Vec<TriggerKeyword> = Vec::with_capacity(keywords.len());
        for mut keyword in keywords {
            keyword.project_id = project_id.to_string();
            if let Some(existing) = unique.iter_mut().find(|k| k.keyword == keyword.keyword) {
                existing.mode = keyword.mode;
            } else {
                unique.push(keyword);
            }
        }
        unique.sort_by(|a, b| {
            a.mode
                .as_str()
                .cmp(b.mode.as_str())
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        self.write().keywords.insert(project_id.to_string(), unique);
    }

    pub fn set_setting(&self, key: &str, value: Value) {
        self.write().settings.insert(key.to_string(), value);
    }

    /// Snapshot of all tasks in creation order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks.clone()
    }
}

/// Drop the oldest finished tasks until at most `retention` remain.
fn evict_finished(tasks: &mut Vec<Task>, retention: usize) -> usize {
    let excess = tasks.len().saturating_sub(retention);
    if excess == 0 {
        return 0;
    }
    let mut remaining = excess;
    tasks.retain(|t| {
        if remaining > 0 && t.status.is_terminal() {
            remaining -= 1;
            false
        } else {
            true
        }
    });
    excess - remaining
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_channel_config(&self, id: &str) -> Result<Option<ChannelConfig>, HookError> {
        Ok(self.read().channel_configs.get(id).cloned())
    }

    async fn get_channel_config_by_path(&self, path: &str) -> Result<Option<ChannelConfig>, HookError> {
        Ok(self
            .read()
            .channel_configs
            .values()
            .find(|c| c.webhook_path == path)
            .cloned())
    }

    async fn list_channel_configs(&self) -> Result<Vec<ChannelConfig>, HookError> {
        let mut configs: Vec<ChannelConfig> = self.read().channel_configs.values().cloned().collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(configs)
    }

    async fn get_trigger_keywords(&self, project_id: &str) -> Result<Vec<TriggerKeyword>, HookError> {
        Ok(self
            .read()
            .keywords
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, HookError> {
        let task = Task::new(Uuid::new_v4().to_string(), task, Utc::now());
        let mut inner = self.write();
        inner.tasks.push(task.clone());
        let evicted = evict_finished(&mut inner.tasks, self.retention);
        debug!(task_id = %task.id, evicted, "Task stored");
        Ok(task)
    }

    async fn update_task_status(&self, task_id: &str, transition: TaskTransition) -> Result<Task, HookError> {
        let mut inner = self.write();
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| HookError::Store(format!("task not found: {task_id}")))?;
        task.apply(transition, Utc::now())?;
        Ok(task.clone())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, HookError> {
        Ok(self.read().tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, limit: usize, offset: usize) -> Result<Vec<Task>, HookError> {
        Ok(self
            .read()
            .tasks
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn is_webhook_processed(&self, event_id: &str) -> Result<bool, HookError> {
        Ok(self.read().deliveries.contains_key(event_id))
    }

    async fn record_webhook_delivery(&self, delivery: WebhookDelivery) -> Result<(), HookError> {
        let mut inner = self.write();
        if inner.deliveries.contains_key(&delivery.event_id) {
            return Ok(());
        }
        inner.delivery_order.push_back(delivery.event_id.clone());
        inner.deliveries.insert(delivery.event_id.clone(), delivery);
        while inner.delivery_order.len() > self.retention {
            if let Some(oldest) = inner.delivery_order.pop_front() {
                inner.deliveries.remove(&oldest);
            }
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, HookError> {
        Ok(self.read().settings.get(key).cloned())
    }
}
