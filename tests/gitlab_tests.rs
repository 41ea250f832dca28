mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use common::{RecordingSink, config_map, headers};
use hookdog::channels::{Channel, GitLabChannel, WebhookRequest};
use hookdog::core::models::{ChannelType, ReplyContext};
use httpmock::prelude::*;
use serde_json::{Value, json};

const SECRET: &str = "gl-secret";

fn channel() -> GitLabChannel {
    GitLabChannel::new(Duration::from_secs(5))
}

fn note_payload(system: bool, noteable_type: &str) -> Value {
    json!({
        "object_kind": "note",
        "event_type": "note",
        "user": { "id": 1, "name": "Alice", "username": "alice" },
        "project_id": 42,
        "project": { "id": 42, "web_url": "https://gitlab.example.com/group/app" },
        "object_attributes": {
            "id": 1001,
            "note": "hey @opencode please review",
            "noteable_type": noteable_type,
            "system": system,
            "url": "https://gitlab.example.com/group/app/-/issues/7#note_1001"
        },
        "issue": { "iid": 7, "title": "Crash on startup", "description": null }
    })
}

fn note_request(token: &str, event: &str, body: &Value) -> WebhookRequest {
    WebhookRequest::post(
        headers(&[
            ("X-Gitlab-Token", token),
            ("X-Gitlab-Event", event),
            ("X-Gitlab-Event-UUID", "evt-123"),
        ]),
        serde_json::to_vec(body).unwrap(),
    )
}

fn run(request: WebhookRequest, config: Value) -> (StatusCode, RecordingSink) {
    let sink = RecordingSink::default();
    let handler = channel().build_handler("cfg-1", SECRET, &config_map(config), sink.as_sink());
    let response = handler(request);
    (response.status, sink)
}

#[test]
fn test_validate_config_names_missing_field() {
    let gitlab = channel();
    let err = gitlab
        .validate_config(&config_map(json!({ "token": "t" })))
        .unwrap_err();
    assert!(err.to_string().contains("missing required field: base_url"));
    assert!(gitlab
        .validate_config(&config_map(json!({ "base_url": "https://gitlab.example.com", "token": "t" })))
        .is_ok());
}

#[test]
fn test_issue_note_is_forwarded() {
    let (status, sink) = run(note_request(SECRET, "Note Hook", &note_payload(false, "Issue")), json!({}));
    assert_eq!(status, StatusCode::OK);

    let messages = sink.received();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.channel_type, ChannelType::GitLab);
    assert_eq!(message.channel_config_id, "cfg-1");
    assert_eq!(message.body, "hey @opencode please review");
    assert_eq!(message.author, "alice");
    assert_eq!(message.title, "Crash on startup");
    assert_eq!(
        message.external_ref,
        "https://gitlab.example.com/group/app/-/issues/7#note_1001"
    );
    assert_eq!(
        message.reply_context,
        ReplyContext::GitLab {
            project_id: 42,
            issue_iid: 7
        }
    );
    assert_eq!(message.delivery.as_ref().unwrap().event_id, "evt-123");
}

#[test]
fn test_confidential_note_is_forwarded() {
    let (status, sink) = run(
        note_request(SECRET, "Confidential Note Hook", &note_payload(false, "Issue")),
        json!({}),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sink.received().len(), 1);
}

#[test]
fn test_system_note_never_reaches_sink() {
    let (status, sink) = run(note_request(SECRET, "Note Hook", &note_payload(true, "Issue")), json!({}));
    assert_eq!(status, StatusCode::OK);
    assert!(sink.received().is_empty());
}

#[test]
fn test_merge_request_note_is_ignored() {
    let (status, sink) = run(
        note_request(SECRET, "Note Hook", &note_payload(false, "MergeRequest")),
        json!({}),
    );
    assert_eq!(status, StatusCode::OK);
    assert!(sink.received().is_empty());
}

#[test]
fn test_wrong_token_is_forbidden() {
    let (status, sink) = run(note_request("nope", "Note Hook", &note_payload(false, "Issue")), json!({}));
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(sink.received().is_empty());
}

#[test]
fn test_missing_token_is_forbidden() {
    let request = WebhookRequest::post(
        headers(&[("X-Gitlab-Event", "Note Hook")]),
        serde_json::to_vec(&note_payload(false, "Issue")).unwrap(),
    );
    let (status, _) = run(request, json!({}));
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[test]
fn test_non_post_is_rejected() {
    let mut request = note_request(SECRET, "Note Hook", &note_payload(false, "Issue"));
    request.method = Method::GET;
    let (status, sink) = run(request, json!({}));
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(sink.received().is_empty());
}

#[test]
fn test_other_events_are_acknowledged_without_action() {
    let (status, sink) = run(note_request(SECRET, "Push Hook", &json!({ "ref": "main" })), json!({}));
    assert_eq!(status, StatusCode::OK);
    assert!(sink.received().is_empty());
}

#[test]
fn test_body_errors() {
    let empty = WebhookRequest::post(
        headers(&[("X-Gitlab-Token", SECRET), ("X-Gitlab-Event", "Note Hook")]),
        Vec::new(),
    );
    assert_eq!(run(empty, json!({})).0, StatusCode::BAD_REQUEST);

    let malformed = WebhookRequest::post(
        headers(&[("X-Gitlab-Token", SECRET), ("X-Gitlab-Event", "Note Hook")]),
        b"{not json".to_vec(),
    );
    assert_eq!(run(malformed, json!({})).0, StatusCode::BAD_REQUEST);

    let wrong_shape = note_request(SECRET, "Note Hook", &json!({ "object_kind": "note" }));
    assert_eq!(run(wrong_shape, json!({})).0, StatusCode::UNPROCESSABLE_ENTITY);
}

#[test]
fn test_external_ref_falls_back_to_issue_url() {
    let mut payload = note_payload(false, "Issue");
    payload["object_attributes"]["url"] = Value::Null;
    let (_, sink) = run(note_request(SECRET, "Note Hook", &payload), json!({}));
    assert_eq!(
        sink.received()[0].external_ref,
        "https://gitlab.example.com/group/app/-/issues/7"
    );
}

#[test]
fn test_own_bot_notes_are_dropped() {
    let (status, sink) = run(
        note_request(SECRET, "Note Hook", &note_payload(false, "Issue")),
        json!({ "bot_username": "alice" }),
    );
    assert_eq!(status, StatusCode::OK);
    assert!(sink.received().is_empty());
}

#[tokio::test]
async fn test_send_reply_posts_issue_note() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v4/projects/42/issues/7/notes")
                .header("PRIVATE-TOKEN", "gl-token")
                .json_body(json!({ "body": "hello from the bot" }));
            then.status(201).json_body(json!({ "id": 1 }));
        })
        .await;

    let config = config_map(json!({ "base_url": server.base_url(), "token": "gl-token" }));
    let message = common::gitlab_message("cfg-1", "hey");
    channel()
        .send_reply(&config, &message, "hello from the bot")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_reply_surfaces_api_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v4/projects/42/issues/7/notes");
            then.status(403).body("403 Forbidden");
        })
        .await;

    let config = config_map(json!({ "base_url": format!("{}/api/v4", server.base_url()), "token": "t" }));
    let err = channel()
        .send_reply(&config, &common::gitlab_message("cfg-1", "hey"), "x")
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("403"), "{text}");
    assert!(text.contains("403 Forbidden"), "{text}");
}

#[tokio::test]
async fn test_send_reply_rejects_foreign_context() {
    let mut message = common::gitlab_message("cfg-1", "hey");
    message.reply_context = ReplyContext::Telegram {
        chat_id: 1,
        message_id: 2,
    };
    let config = config_map(json!({ "base_url": "http://127.0.0.1:9", "token": "t" }));
    assert!(channel().send_reply(&config, &message, "x").await.is_err());
}
