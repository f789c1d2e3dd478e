//! Keyword-delimited field extraction over accumulated caption text.
//!
//! Extraction is pure: the same trigger, keywords and segments always yield
//! the same [`FieldMap`]. Nothing is inferred beyond keyword boundaries.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use super::keywords::{keyword_pattern, KeywordSpec};

/// Field whose occurrences accumulate instead of overwriting.
pub const LABEL_FIELD: &str = "label";
/// Field synthesized from the text between trigger and first keyword.
pub const TITLE_FIELD: &str = "title";

const SENTENCE_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Value of one extracted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }
}

/// Extracted field name → value(s). Always rebuilt from scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldMap {
    fields: BTreeMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Single-valued field as text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_text)
    }

    /// Label values in the order they were spoken.
    pub fn labels(&self) -> &[String] {
        match self.fields.get(LABEL_FIELD) {
            Some(FieldValue::List(labels)) => labels,
            _ => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert a single value; a later call for the same field wins.
    pub fn set_text(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields
            .insert(field.into(), FieldValue::Text(value.into()));
    }

    pub fn push_label(&mut self, value: impl Into<String>) {
        let entry = self
            .fields
            .entry(LABEL_FIELD.to_string())
            .or_insert_with(|| FieldValue::List(Vec::new()));
        match entry {
            FieldValue::List(labels) => labels.push(value.into()),
            other => *other = FieldValue::List(vec![value.into()]),
        }
    }
}

/// Locates the trigger phrase and carves what follows into fields.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    trigger_phrase: String,
    trigger: Regex,
    keywords: KeywordSpec,
}

impl FieldExtractor {
    pub fn new(trigger_phrase: &str, keywords: KeywordSpec) -> Result<Self> {
        let trigger_phrase = trigger_phrase.trim();
        anyhow::ensure!(!trigger_phrase.is_empty(), "Trigger phrase must not be empty");

        let trigger = Regex::new(&format!("(?i){}", keyword_pattern(trigger_phrase)))
            .context("Invalid trigger phrase")?;

        Ok(Self {
            trigger_phrase: trigger_phrase.to_string(),
            trigger,
            keywords,
        })
    }

    pub fn trigger_phrase(&self) -> &str {
        &self.trigger_phrase
    }

    pub fn keywords(&self) -> &KeywordSpec {
        &self.keywords
    }

    /// Whether `text` contains the trigger phrase anywhere, ignoring case.
    pub fn contains_trigger(&self, text: &str) -> bool {
        self.trigger.is_match(text)
    }

    /// Extract fields from the ordered caption segments of one command.
    ///
    /// Returns an empty map when the trigger phrase is not present in the
    /// joined text, whether it was never spoken or has left the window.
    pub fn extract_fields<S: AsRef<str>>(&self, segments: &[S]) -> FieldMap {
        let text = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");

        let Some(trigger) = self.trigger.find(&text) else {
            return FieldMap::new();
        };
        let post_trigger = &text[trigger.end()..];

        let matches = self.keywords.find_matches(post_trigger);
        let mut fields = FieldMap::new();

        for (i, m) in matches.iter().enumerate() {
            let end = matches
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(post_trigger.len());

            let value = clean_value(&post_trigger[m.end..end]);
            if value.is_empty() {
                continue;
            }

            if m.field == LABEL_FIELD {
                fields.push_label(value);
            } else {
                fields.set_text(m.field.clone(), value);
            }
        }

        if !fields.contains(TITLE_FIELD) {
            let end = matches.first().map(|m| m.start).unwrap_or(post_trigger.len());
            let title = clean_value(&post_trigger[..end]);
            if !title.is_empty() {
                fields.set_text(TITLE_FIELD, title);
            }
        }

        fields
    }
}

/// Trim whitespace, a leading `:` separator ("title: x"), then trailing
/// sentence punctuation.
fn clean_value(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches([':', '：'])
        .trim()
        .trim_end_matches(SENTENCE_PUNCTUATION)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FieldExtractor {
        let keywords = KeywordSpec::new(vec![
            ("team", vec!["team"]),
            ("project", vec!["project"]),
            ("cycle", vec!["cycle"]),
            ("due_date", vec!["due date"]),
            ("priority", vec!["priority"]),
            ("assignee", vec!["assignee"]),
            ("label", vec!["label", "labels"]),
            ("title", vec!["title"]),
            ("description", vec!["description"]),
        ])
        .unwrap();
        FieldExtractor::new("please create issue", keywords).unwrap()
    }

    #[test]
    fn test_no_trigger_yields_empty_map() {
        let fields = extractor().extract_fields(&["title login broken", "team platform"]);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_empty_segments() {
        let segments: Vec<String> = Vec::new();
        assert!(extractor().extract_fields(&segments).is_empty());
    }

    #[test]
    fn test_basic_command() {
        let fields = extractor().extract_fields(&[
            "Please create issue",
            "title login API returns 500",
            "project authentication revamp",
            "team platform",
        ]);

        assert_eq!(fields.len(), 3);
        assert_eq!(fields.text("title"), Some("login API returns 500"));
        assert_eq!(fields.text("project"), Some("authentication revamp"));
        assert_eq!(fields.text("team"), Some("platform"));
    }

    #[test]
    fn test_labels_accumulate_in_order() {
        let fields = extractor().extract_fields(&[
            "Please create issue",
            "title fix bug",
            "team backend",
            "label bug",
            "label critical",
            "priority urgent",
        ]);

        assert_eq!(fields.labels(), &["bug".to_string(), "critical".to_string()]);
        assert_eq!(fields.text("title"), Some("fix bug"));
        assert_eq!(fields.text("team"), Some("backend"));
        assert_eq!(fields.text("priority"), Some("urgent"));
    }

    #[test]
    fn test_duplicate_labels_kept() {
        let fields =
            extractor().extract_fields(&["please create issue title x", "label bug", "labels bug"]);
        assert_eq!(fields.labels(), &["bug".to_string(), "bug".to_string()]);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let fields = extractor().extract_fields(&[
            "please create issue title crash",
            "team backend",
            "actually team platform",
        ]);
        assert_eq!(fields.text("team"), Some("platform"));
    }

    #[test]
    fn test_value_before_next_keyword_keeps_filler() {
        let fields =
            extractor().extract_fields(&["please create issue title crash", "team backend um"]);
        assert_eq!(fields.text("team"), Some("backend um"));
    }

    #[test]
    fn test_trailing_punctuation_stripped() {
        let fields = extractor().extract_fields(&["Please create issue title crash.", "team platform."]);
        assert_eq!(fields.text("team"), Some("platform"));
        assert_eq!(fields.text("title"), Some("crash"));
    }

    #[test]
    fn test_repeated_punctuation_stripped() {
        let fields = extractor().extract_fields(&["please create issue title crash?!", "priority high..."]);
        assert_eq!(fields.text("title"), Some("crash"));
        assert_eq!(fields.text("priority"), Some("high"));
    }

    #[test]
    fn test_title_synthesized_from_leading_text() {
        let fields =
            extractor().extract_fields(&["Please create issue checkout page times out.", "team web"]);
        assert_eq!(fields.text("title"), Some("checkout page times out"));
        assert_eq!(fields.text("team"), Some("web"));
    }

    #[test]
    fn test_title_synthesized_without_keywords() {
        let fields = extractor().extract_fields(&["please create issue checkout page times out"]);
        assert_eq!(fields.text("title"), Some("checkout page times out"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_trigger_alone_is_empty() {
        assert!(extractor().extract_fields(&["Please create issue."]).is_empty());
        assert!(extractor().extract_fields(&["please create issue", ""]).is_empty());
    }

    #[test]
    fn test_adjacent_keywords_drop_empty_value() {
        let fields = extractor().extract_fields(&["please create issue title crash team priority high"]);
        assert!(!fields.contains("team"));
        assert_eq!(fields.text("priority"), Some("high"));
    }

    #[test]
    fn test_text_before_trigger_is_ignored() {
        let fields = extractor().extract_fields(&[
            "team alpha said something",
            "please create issue title real one",
            "team platform",
        ]);
        assert_eq!(fields.text("team"), Some("platform"));
        assert_eq!(fields.text("title"), Some("real one"));
    }

    #[test]
    fn test_only_first_trigger_anchors() {
        let fields = extractor().extract_fields(&[
            "please create issue title first",
            "please create issue team platform",
        ]);
        assert_eq!(fields.text("title"), Some("first please create issue"));
        assert_eq!(fields.text("team"), Some("platform"));
    }

    #[test]
    fn test_trigger_case_insensitive() {
        let fields = extractor().extract_fields(&["PLEASE CREATE ISSUE team Platform"]);
        assert_eq!(fields.text("team"), Some("Platform"));
    }

    #[test]
    fn test_multi_word_keyword() {
        let fields = extractor().extract_fields(&["please create issue title x", "due date March 15th"]);
        assert_eq!(fields.text("due_date"), Some("March 15th"));
    }

    #[test]
    fn test_colon_after_keyword_is_dropped() {
        let fields = extractor()
            .extract_fields(&["Please create issue, title: login broken", "team: platform."]);
        assert_eq!(fields.text("title"), Some("login broken"));
        assert_eq!(fields.text("team"), Some("platform"));
    }

    #[test]
    fn test_idempotent() {
        let segments = ["Please create issue", "title fix bug", "label a", "label b", "team x"];
        let ex = extractor();
        assert_eq!(ex.extract_fields(&segments), ex.extract_fields(&segments));
    }

    #[test]
    fn test_prefix_stability() {
        let segments = [
            "Please create issue",
            "title login API returns 500",
            "project authentication revamp",
            "team platform",
            "priority high",
        ];
        let ex = extractor();
        let full = ex.extract_fields(&segments);

        // "project" is complete once "team" follows it
        let prefix = ex.extract_fields(&segments[..4]);
        assert_eq!(prefix.text("project"), full.text("project"));
        assert_eq!(prefix.text("title"), full.text("title"));
    }

    #[test]
    fn test_contains_trigger() {
        let ex = extractor();
        assert!(ex.contains_trigger("ok so Please Create Issue now"));
        assert!(!ex.contains_trigger("please create an issue"));
    }

    #[test]
    fn test_field_map_serializes_flat() {
        let fields = extractor().extract_fields(&["please create issue title x", "label a", "team t"]);
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"title": "x", "label": ["a"], "team": "t"})
        );
    }
}
