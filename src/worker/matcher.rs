use crate::core::models::{KeywordMatch, TriggerKeyword};

/// First keyword, in the given order, found case-insensitively in `text`.
#[must_use]
pub fn match_keyword(text: &str, keywords: &[TriggerKeyword]) -> Option<KeywordMatch> {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .filter(|kw| !kw.keyword.is_empty())
        .find(|kw| lowered.contains(&kw.keyword.to_lowercase()))
        .map(|kw| KeywordMatch {
            keyword: kw.keyword.clone(),
            mode: kw.mode.clone(),
        })
}
