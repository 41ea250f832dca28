//! Runtime tunables with hard-coded defaults.
//!
//! Every tunable is a [`SettingKey`]: the name looked up in the store and the
//! default used when the setting is absent or unparsable. Adding a new
//! tunable is one constant here plus a read through [`Settings`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingKey {
    pub name: &'static str,
    pub default: &'static str,
}

impl SettingKey {
    const fn new(name: &'static str, default: &'static str) -> Self {
        Self { name, default }
    }
}

// Timeouts and behaviour
pub const ANALYSIS_TIMEOUT: SettingKey = SettingKey::new("analysis_timeout", "5m");
pub const SESSION_CLEANUP_TIMEOUT: SettingKey = SettingKey::new("session_cleanup_timeout", "10s");
pub const REPLY_HTTP_TIMEOUT: SettingKey = SettingKey::new("reply_http_timeout", "30s");
pub const TELEGRAM_PARSE_MODE: SettingKey = SettingKey::new("telegram_parse_mode", "Markdown");
pub const WEBHOOK_DEDUP_ENABLED: SettingKey = SettingKey::new("webhook_dedup_enabled", "false");
pub const ANALYSIS_HEALTH_WAIT_SECS: SettingKey = SettingKey::new("analysis_health_wait_secs", "30");

// Prompt fragments
pub const PROMPT_ASK: SettingKey = SettingKey::new(
    "prompt_ask",
    "You are an expert software engineer. Answer the following question with a detailed, actionable response.\n\n",
);
pub const PROMPT_PLAN: SettingKey = SettingKey::new(
    "prompt_plan",
    "You are an expert software architect. Create a detailed implementation plan for the following request.\n\n",
);
pub const PROMPT_DO: SettingKey = SettingKey::new(
    "prompt_do",
    "You are an expert software engineer. Provide the exact code changes needed to resolve the following issue.\n\n",
);
pub const PROMPT_DEFAULT: SettingKey = SettingKey::new(
    "prompt_default",
    "You are an expert software engineer. Analyze the following and provide a detailed response.\n\n",
);
pub const PROMPT_SOURCE: SettingKey = SettingKey::new("prompt_source", "## Source: {source}\n");
pub const PROMPT_TITLE: SettingKey = SettingKey::new("prompt_title", "## Title: {title}\n\n");
pub const PROMPT_MESSAGE: SettingKey =
    SettingKey::new("prompt_message", "### Message from @{author}:\n{body}\n\n");
pub const PROMPT_REFERENCE: SettingKey =
    SettingKey::new("prompt_reference", "Reference: {reference}\n\n");
pub const PROMPT_FORMAT: SettingKey =
    SettingKey::new("prompt_format", "Format your response in Markdown.");

// Reply templates
pub const TEMPLATE_ACK: SettingKey = SettingKey::new(
    "template_ack",
    "🔍 **Hookdog** received your request ({mode} mode).\n> Keyword: `{keyword}` | Author: {author}\n\n_Analyzing..._",
);
pub const TEMPLATE_RESULT: SettingKey = SettingKey::new(
    "template_result",
    "## 🤖 Hookdog Analysis\n\n{result}\n\n---\n_{mode} mode | triggered by {author}_",
);
pub const TEMPLATE_ERROR: SettingKey =
    SettingKey::new("template_error", "⚠️ **Hookdog** error:\n```\n{error}\n```");

/// Typed accessors over the store's settings with fallback-on-absence.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn Store>,
}

impl Settings {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn raw(&self, key: SettingKey) -> Option<Value> {
        match self.store.get_setting(key.name).await {
            Ok(value) => value,
            Err(e) => {
                warn!(setting = key.name, error = %e, "Setting lookup failed, using default");
                None
            }
        }
    }

    pub async fn string(&self, key: SettingKey) -> String {
        match self.raw(key).await {
            Some(Value::String(s)) => s,
            _ => key.default.to_string(),
        }
    }

    pub async fn duration(&self, key: SettingKey) -> Duration {
        let parsed = match self.raw(key).await {
            Some(Value::String(s)) => parse_duration(&s),
            Some(Value::Number(n)) => n.as_u64().map(Duration::from_secs),
            _ => None,
        };
        parsed.unwrap_or_else(|| parse_duration(key.default).unwrap_or_default())
    }

    pub async fn bool(&self, key: SettingKey) -> bool {
        let parsed = match self.raw(key).await {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::String(s)) => s.parse::<bool>().ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| key.default == "true")
    }

    pub async fn u64(&self, key: SettingKey) -> u64 {
        let parsed = match self.raw(key).await {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.unwrap_or_else(|| key.default.parse().unwrap_or_default())
    }
}

/// Parse `90`, `500ms`, `30s`, `5m` or `1h`. Bare numbers are seconds.
#[must_use]
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}
