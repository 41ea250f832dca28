//! Prompt and reply text, built from overridable templates.

use crate::core::models::{NormalizedMessage, TriggerMode};
use crate::core::settings::{self, SettingKey, Settings};

/// Substitute `{name}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing braces
/// is inserted verbatim. Unknown placeholders are left as-is.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if name.contains('{') {
            out.push('{');
            rest = after;
            continue;
        }
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Every template used for one dispatch, read from settings up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub ask: String,
    pub plan: String,
    pub act: String,
    pub fallback: String,
    pub source: String,
    pub title: String,
    pub message: String,
    pub reference: String,
    pub format: String,
    pub ack: String,
    pub result: String,
    pub error: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        let d = |key: SettingKey| key.default.to_string();
        Self {
            ask: d(settings::PROMPT_ASK),
            plan: d(settings::PROMPT_PLAN),
            act: d(settings::PROMPT_DO),
            fallback: d(settings::PROMPT_DEFAULT),
            source: d(settings::PROMPT_SOURCE),
            title: d(settings::PROMPT_TITLE),
            message: d(settings::PROMPT_MESSAGE),
            reference: d(settings::PROMPT_REFERENCE),
            format: d(settings::PROMPT_FORMAT),
            ack: d(settings::TEMPLATE_ACK),
            result: d(settings::TEMPLATE_RESULT),
            error: d(settings::TEMPLATE_ERROR),
        }
    }
}

impl PromptTemplates {
    pub async fn load(settings: &Settings) -> Self {
        Self {
            ask: settings.string(settings::PROMPT_ASK).await,
            plan: settings.string(settings::PROMPT_PLAN).await,
            act: settings.string(settings::PROMPT_DO).await,
            fallback: settings.string(settings::PROMPT_DEFAULT).await,
            source: settings.string(settings::PROMPT_SOURCE).await,
            title: settings.string(settings::PROMPT_TITLE).await,
            message: settings.string(settings::PROMPT_MESSAGE).await,
            reference: settings.string(settings::PROMPT_REFERENCE).await,
            format: settings.string(settings::PROMPT_FORMAT).await,
            ack: settings.string(settings::TEMPLATE_ACK).await,
            result: settings.string(settings::TEMPLATE_RESULT).await,
            error: settings.string(settings::TEMPLATE_ERROR).await,
        }
    }

    fn preamble(&self, mode: &TriggerMode) -> &str {
        match mode {
            TriggerMode::Ask => &self.ask,
            TriggerMode::Plan => &self.plan,
            TriggerMode::Do => &self.act,
            TriggerMode::Other(_) => &self.fallback,
        }
    }

    /// Full analysis prompt for a message in the given mode.
    #[must_use]
    pub fn build_prompt(&self, message: &NormalizedMessage, mode: &TriggerMode) -> String {
        let mut prompt = String::from(self.preamble(mode));
        prompt.push_str(&render(&self.source, &[("source", message.channel_type.as_str())]));
        prompt.push_str(&render(&self.title, &[("title", &message.title)]));
        prompt.push_str(&render(
            &self.message,
            &[("author", &message.author), ("body", &message.body)],
        ));
        if !message.external_ref.is_empty() {
            prompt.push_str(&render(&self.reference, &[("reference", &message.external_ref)]));
        }
        prompt.push_str(&self.format);
        prompt
    }

    #[must_use]
    pub fn ack_reply(&self, mode: &TriggerMode, keyword: &str, author: &str) -> String {
        render(
            &self.ack,
            &[("mode", mode.as_str()), ("keyword", keyword), ("author", author)],
        )
    }

    #[must_use]
    pub fn result_reply(&self, result: &str, mode: &TriggerMode, author: &str) -> String {
        render(
            &self.result,
            &[("result", result), ("mode", mode.as_str()), ("author", author)],
        )
    }

    #[must_use]
    pub fn error_reply(&self, error: &str) -> String {
        render(&self.error, &[("error", error)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_single_pass() {
        let out = render("{a} and {b}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "{b} and x");
    }

    #[test]
    fn test_render_leaves_unknown_and_unclosed() {
        assert_eq!(render("{missing} {", &[]), "{missing} {");
        assert_eq!(render("{ {a}", &[("a", "1")]), "{ 1");
        assert_eq!(render("no placeholders", &[("a", "1")]), "no placeholders");
    }
}
