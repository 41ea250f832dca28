mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{channel_config, gitlab_message};
use hookdog::ai::SessionClient;
use hookdog::api::helpers::{WebhookResponse, ok_empty};
use hookdog::channels::{Channel, ChannelRegistry, MessageSink, WebhookHandler, WebhookRequest};
use hookdog::core::models::{ChannelType, ConfigMap, NormalizedMessage, TriggerKeyword};
use hookdog::errors::HookError;
use hookdog::store::MemoryStore;
use hookdog::worker::{Analyzer, spawn_dispatcher};
use httpmock::prelude::*;
use serde_json::json;

/// Counts messages between their ack and their final reply.
#[derive(Default)]
struct GaugeChannel {
    state: Mutex<Gauge>,
}

#[derive(Default)]
struct Gauge {
    open: HashSet<String>,
    peak: usize,
    finished: usize,
}

impl GaugeChannel {
    fn peak(&self) -> usize {
        self.state.lock().unwrap().peak
    }

    fn finished(&self) -> usize {
        self.state.lock().unwrap().finished
    }
}

#[async_trait]
impl Channel for GaugeChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::GitLab
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

    async fn send_reply(&self, _config: &ConfigMap, message: &NormalizedMessage, _text: &str) -> Result<(), HookError> {
        let mut gauge = self.state.lock().unwrap();
        if gauge.open.remove(&message.external_ref) {
            gauge.finished += 1;
        } else {
            gauge.open.insert(message.external_ref.clone());
            gauge.peak = gauge.peak.max(gauge.open.len());
        }
        Ok(())
    }
}

async fn slow_session_service(server: &MockServer, delay: Duration) {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/session");
            then.status(200).json_body(json!({ "id": "s1" }));
        })
        .await;
    server
        .mock_async(move |when, then| {
            when.method(POST).path("/session/s1/message");
            then.status(200)
                .delay(delay)
                .json_body(json!({ "info": {}, "parts": [{ "type": "text", "text": "AI body" }] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/session/s1");
            then.status(200);
        })
        .await;
}

fn analyzer(session_base_url: &str, channel: Arc<GaugeChannel>) -> (Arc<MemoryStore>, Arc<Analyzer>) {
    let store = Arc::new(MemoryStore::new());
    store.insert_channel_config(channel_config(
        "cfg-1",
        "proj-1",
        ChannelType::GitLab,
        json!({ "base_url": "https://gitlab.example.com", "token": "t" }),
        "secret",
        "/hooks/gitlab",
    ));
    store.set_trigger_keywords("proj-1", vec![TriggerKeyword::new("proj-1", "@opencode", "ask")]);

    let registry = Arc::new(ChannelRegistry::new());
    registry.register(channel);
    let sessions = Arc::new(
        SessionClient::new(
            session_base_url,
            "opencode",
            "pw",
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let analyzer = Arc::new(Analyzer::new(store.clone(), registry, sessions));
    (store, analyzer)
}

fn numbered_message(n: usize) -> NormalizedMessage {
    let mut message = gitlab_message("cfg-1", "@opencode look at this");
    message.external_ref = format!("https://gitlab.example.com/group/app/-/issues/7#note_{n}");
    message
}

#[tokio::test]
async fn test_worker_pool_caps_concurrent_analyses() {
    let server = MockServer::start_async().await;
    slow_session_service(&server, Duration::from_millis(300)).await;
    let channel = Arc::new(GaugeChannel::default());
    let (_store, analyzer) = analyzer(&server.base_url(), channel.clone());

    let (queue, dispatcher) = spawn_dispatcher(analyzer, 16, 2);
    for n in 0..5 {
        assert!(queue.enqueue(numbered_message(n)));
    }
    drop(queue);

    assert!(dispatcher.shutdown(Duration::from_secs(10)).await);
    assert_eq!(channel.peak(), 2);
    assert_eq!(channel.finished(), 5);
}

#[tokio::test]
async fn test_shutdown_returns_after_every_task_is_terminal() {
    let server = MockServer::start_async().await;
    slow_session_service(&server, Duration::from_millis(100)).await;
    let channel = Arc::new(GaugeChannel::default());
    let (store, analyzer) = analyzer(&server.base_url(), channel.clone());

    let (queue, dispatcher) = spawn_dispatcher(analyzer, 16, 2);
    for n in 0..4 {
        assert!(queue.enqueue(numbered_message(n)));
    }
    drop(queue);

    assert!(dispatcher.shutdown(Duration::from_secs(10)).await);
    let tasks = store.tasks();
    assert_eq!(tasks.len(), 4);
    assert!(tasks.iter().all(|task| task.status.is_terminal()), "{tasks:?}");
}

#[tokio::test]
async fn test_shutdown_times_out_while_work_is_pending() {
    let server = MockServer::start_async().await;
    slow_session_service(&server, Duration::from_millis(500)).await;
    let channel = Arc::new(GaugeChannel::default());
    let (_store, analyzer) = analyzer(&server.base_url(), channel);

    let (queue, dispatcher) = spawn_dispatcher(analyzer, 16, 1);
    for n in 0..3 {
        assert!(queue.enqueue(numbered_message(n)));
    }
    drop(queue);

    assert!(!dispatcher.shutdown(Duration::from_millis(50)).await);
}
