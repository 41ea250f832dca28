use std::io::Write;

use hookdog::core::models::{ChannelType, TriggerMode};
use hookdog::core::settings::{self, Settings};
use hookdog::store::{MemoryStore, Store};
use std::sync::Arc;
use std::time::Duration;

const SEED: &str = r#"{
  "channel_configs": [
    {
      "id": "cfg-gl",
      "project_id": "proj-1",
      "channel_type": "gitlab",
      "config": { "base_url": "https://gitlab.example.com", "token": "t" },
      "webhook_secret": "s3cret",
      "webhook_path": "/hooks/gitlab"
    },
    {
      "id": "cfg-tg",
      "project_id": "proj-2",
      "channel_type": "telegram",
      "webhook_path": "/hooks/telegram",
      "enabled": false
    }
  ],
  "trigger_keywords": [
    { "project_id": "proj-1", "keyword": "/plan", "mode": "plan" },
    { "project_id": "proj-1", "keyword": "@opencode", "mode": "ask" },
    { "project_id": "proj-2", "keyword": "!triage", "mode": "triage" }
  ],
  "settings": {
    "analysis_timeout": "90s",
    "webhook_dedup_enabled": true
  }
}"#;

fn seed_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_seed_file_populates_store() {
    let file = seed_file(SEED);
    let store = MemoryStore::from_seed_file(file.path()).unwrap();

    let gitlab = store.get_channel_config_by_path("/hooks/gitlab").await.unwrap().unwrap();
    assert_eq!(gitlab.id, "cfg-gl");
    assert_eq!(gitlab.channel_type, ChannelType::GitLab);
    assert!(gitlab.enabled);
    assert_eq!(gitlab.webhook_secret, "s3cret");

    let telegram = store.get_channel_config("cfg-tg").await.unwrap().unwrap();
    assert!(!telegram.enabled);
    assert!(telegram.config.is_empty());

    let keywords = store.get_trigger_keywords("proj-1").await.unwrap();
    let modes: Vec<TriggerMode> = keywords.iter().map(|k| k.mode.clone()).collect();
    assert_eq!(modes, vec![TriggerMode::Ask, TriggerMode::Plan]);

    let custom = store.get_trigger_keywords("proj-2").await.unwrap();
    assert_eq!(custom[0].mode, TriggerMode::Other("triage".to_string()));
}

#[tokio::test]
async fn test_seeded_settings_feed_typed_accessors() {
    let file = seed_file(SEED);
    let store: Arc<dyn Store> = Arc::new(MemoryStore::from_seed_file(file.path()).unwrap());
    let tunables = Settings::new(store);

    assert_eq!(tunables.duration(settings::ANALYSIS_TIMEOUT).await, Duration::from_secs(90));
    assert!(tunables.bool(settings::WEBHOOK_DEDUP_ENABLED).await);
    assert_eq!(tunables.duration(settings::SESSION_CLEANUP_TIMEOUT).await, Duration::from_secs(10));
    assert_eq!(tunables.string(settings::TELEGRAM_PARSE_MODE).await, "Markdown");
    assert_eq!(tunables.u64(settings::ANALYSIS_HEALTH_WAIT_SECS).await, 30);
}

#[test]
fn test_seed_file_errors() {
    let missing = std::env::temp_dir().join("hookdog-no-such-seed.json");
    let err = MemoryStore::from_seed_file(&missing).err().unwrap();
    assert!(err.to_string().contains("hookdog-no-such-seed.json"));

    let broken = seed_file("{ not json");
    assert!(MemoryStore::from_seed_file(broken.path()).is_err());
}

#[tokio::test]
async fn test_overflowing_duration_setting_falls_back_to_default() {
    let store = MemoryStore::new();
    store.set_setting("analysis_timeout", serde_json::json!("10000000000000000h"));
    store.set_setting("session_cleanup_timeout", serde_json::json!(u64::MAX));
    let tunables = Settings::new(Arc::new(store));

    assert_eq!(tunables.duration(settings::ANALYSIS_TIMEOUT).await, Duration::from_secs(300));
    assert_eq!(
        tunables.duration(settings::SESSION_CLEANUP_TIMEOUT).await,
        Duration::from_secs(u64::MAX)
    );
}
