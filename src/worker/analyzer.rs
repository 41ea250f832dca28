use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, error, info, info_span, warn};

use super::matcher::match_keyword;
use crate::ai::SessionClient;
use crate::channels::{Channel, ChannelRegistry};
use crate::core::models::{ChannelConfig, KeywordMatch, NewTask, NormalizedMessage, TaskTransition, WebhookDelivery};
use crate::core::settings::{self, Settings};
use crate::prompt::PromptTemplates;
use crate::store::Store;

/// Why a message produced no task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    ConfigMissing,
    NoMatch,
    Duplicate,
    UnknownChannel,
    StoreUnavailable,
}

/// How far one message got through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    Completed(String),
    Failed(String),
}

/// Turns normalized messages into analysed, replied-to tasks.
pub struct Analyzer {
    store: Arc<dyn Store>,
    registry: Arc<ChannelRegistry>,
    sessions: Arc<SessionClient>,
    settings: Settings,
}

impl Analyzer {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, registry: Arc<ChannelRegistry>, sessions: Arc<SessionClient>) -> Self {
        let settings = Settings::new(Arc::clone(&store));
        Self {
            store,
            registry,
            sessions,
            settings,
        }
    }

    /// Run one message through config lookup, matching, task creation,
    /// analysis and replies. Nothing is retried and no step is rolled back.
    pub async fn handle_message(&self, message: NormalizedMessage) -> DispatchOutcome {
        let span = info_span!(
            "dispatch",
            channel = %message.channel_type,
            channel_config_id = %message.channel_config_id,
            external_ref = %message.external_ref,
        );
        self.dispatch(message).instrument(span).await
    }

    async fn dispatch(&self, mut message: NormalizedMessage) -> DispatchOutcome {
        let config = match self.store.get_channel_config(&message.channel_config_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                error!("Channel config not found");
                return DispatchOutcome::Ignored(IgnoreReason::ConfigMissing);
            }
            Err(e) => {
                error!(error = %e, "Channel config lookup failed");
                return DispatchOutcome::Ignored(IgnoreReason::ConfigMissing);
            }
        };
        if message.project_id.is_empty() {
            message.project_id.clone_from(&config.project_id);
        }

        let keywords = match self.store.get_trigger_keywords(&message.project_id).await {
            Ok(keywords) => keywords,
            Err(e) => {
                error!(project_id = %message.project_id, error = %e, "Trigger keyword lookup failed");
                return DispatchOutcome::Ignored(IgnoreReason::ConfigMissing);
            }
        };

        let Some(matched) = match_keyword(&message.body, &keywords) else {
            info!(project_id = %message.project_id, "No trigger keyword in message");
            return DispatchOutcome::Ignored(IgnoreReason::NoMatch);
        };
        message.trigger = Some(matched.clone());

        if self.is_duplicate(&message).await {
            return DispatchOutcome::Ignored(IgnoreReason::Duplicate);
        }

        let Some(channel) = self.registry.get(message.channel_type) else {
            error!("No adapter registered for channel type");
            return DispatchOutcome::Ignored(IgnoreReason::UnknownChannel);
        };

        let task = match self.store.create_task(NewTask::from_message(&message, &matched)).await {
            Ok(task) => task,
            Err(e) => {
                error!(error = %e, "Task creation failed");
                return DispatchOutcome::Ignored(IgnoreReason::StoreUnavailable);
            }
        };
        info!(
            task_id = %task.id,
            mode = %matched.mode,
            keyword = %matched.keyword,
            author = %message.author,
            "Task created"
        );

        let templates = PromptTemplates::load(&self.settings).await;
        self.reply(
            channel.as_ref(),
            &config,
            &message,
            &templates.ack_reply(&matched.mode, &matched.keyword, &message.author),
            "ack",
        )
        .await;

        if let Err(e) = self.store.update_task_status(&task.id, TaskTransition::Processing).await {
            error!(task_id = %task.id, error = %e, "Failed to mark task processing");
        }

        match self.analyze(&templates, &message, &matched, &task.title).await {
            Ok(result) => {
                info!(task_id = %task.id, response_len = result.len(), "Analysis completed");
                let reply = templates.result_reply(&result, &matched.mode, &message.author);
                self.finish(&task.id, TaskTransition::Completed { result }).await;
                self.reply(channel.as_ref(), &config, &message, &reply, "result").await;
                DispatchOutcome::Completed(task.id)
            }
            Err(e) => {
                let error_text = e.to_string();
                error!(task_id = %task.id, error = %error_text, "Analysis failed");
                let reply = templates.error_reply(&error_text);
                self.finish(&task.id, TaskTransition::Failed { error: error_text }).await;
                self.reply(channel.as_ref(), &config, &message, &reply, "error").await;
                DispatchOutcome::Failed(task.id)
            }
        }
    }

    /// Dedup gate; off unless `webhook_dedup_enabled` is set.
    async fn is_duplicate(&self, message: &NormalizedMessage) -> bool {
        let Some(delivery) = message.delivery.as_ref() else {
            return false;
        };
        if !self.settings.bool(settings::WEBHOOK_DEDUP_ENABLED).await {
            return false;
        }
        match self.store.is_webhook_processed(&delivery.event_id).await {
            Ok(true) => {
                info!(event_id = %delivery.event_id, "Skipping duplicate webhook delivery");
                return true;
            }
            Ok(false) => {}
            Err(e) => warn!(event_id = %delivery.event_id, error = %e, "Dedup lookup failed, processing anyway"),
        }
        if let Err(e) = self
            .store
            .record_webhook_delivery(WebhookDelivery::from_key(delivery, Utc::now()))
            .await
        {
            warn!(event_id = %delivery.event_id, error = %e, "Failed to record webhook delivery");
        }
        false
    }

    async fn analyze(
        &self,
        templates: &PromptTemplates,
        message: &NormalizedMessage,
        matched: &KeywordMatch,
        title: &str,
    ) -> Result<String, crate::errors::HookError> {
        let prompt = templates.build_prompt(message, &matched.mode);
        let budget = self.settings.duration(settings::ANALYSIS_TIMEOUT).await;
        self.sessions.run_prompt(title, &prompt, budget).await
    }

    async fn finish(&self, task_id: &str, transition: TaskTransition) {
        if let Err(e) = self.store.update_task_status(task_id, transition).await {
            error!(task_id, error = %e, "Failed to record task outcome");
        }
    }

    async fn reply(&self, channel: &dyn Channel, config: &ChannelConfig, message: &NormalizedMessage, text: &str, kind: &str) {
        if let Err(e) = channel.send_reply(&config.config, message, text).await {
            error!(reply = kind, error = %e, "Failed to send reply");
        }
    }
}
