//! Keyword configuration compiled into per-field match patterns.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::cmp::Reverse;

/// A compiled pattern for one field: any of its keywords, whole-word,
/// case-insensitive.
#[derive(Debug, Clone)]
struct FieldPattern {
    field: String,
    regex: Regex,
}

/// One keyword occurrence inside post-trigger text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub field: String,
    pub start: usize,
    pub end: usize,
}

/// Field name → trigger keywords, compiled once at startup.
#[derive(Debug, Clone)]
pub struct KeywordSpec {
    patterns: Vec<FieldPattern>,
}

impl KeywordSpec {
    /// Compile keyword lists. Fields are kept in name order so that match
    /// ordering never depends on map iteration order.
    pub fn new<I, F, K>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (F, Vec<K>)>,
        F: Into<String>,
        K: AsRef<str>,
    {
        let mut patterns = Vec::new();

        for (field, keywords) in fields {
            let field = field.into();
            let mut alternatives: Vec<String> = keywords
                .iter()
                .map(|kw| kw.as_ref().trim())
                .filter(|kw| !kw.is_empty())
                .map(bounded_keyword_pattern)
                .collect();

            if alternatives.is_empty() {
                bail!("Field '{}' has no keywords configured", field);
            }

            // Longer alternatives first so "due date" beats "due" at the same offset.
            alternatives.sort_by_key(|alt| Reverse(alt.len()));
            alternatives.dedup();

            let pattern = format!("(?i)(?:{})", alternatives.join("|"));
            let regex = Regex::new(&pattern)
                .with_context(|| format!("Invalid keyword pattern for field '{field}'"))?;

            patterns.push(FieldPattern { field, regex });
        }

        patterns.sort_by(|a, b| a.field.cmp(&b.field));
        Ok(Self { patterns })
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.field.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// All keyword matches in `text`, ascending by start offset.
    ///
    /// At equal start the longest match wins, remaining ties go to field
    /// name order, and any match overlapping an already accepted one is
    /// dropped, so the result is a sequence of disjoint spans.
    pub fn find_matches(&self, text: &str) -> Vec<KeywordMatch> {
        let mut candidates: Vec<(usize, KeywordMatch)> = Vec::new();

        for (order, pattern) in self.patterns.iter().enumerate() {
            for m in pattern.regex.find_iter(text) {
                if !stands_alone(text, m.start(), m.end()) {
                    continue;
                }
                candidates.push((
                    order,
                    KeywordMatch {
                        field: pattern.field.clone(),
                        start: m.start(),
                        end: m.end(),
                    },
                ));
            }
        }

        candidates.sort_by_key(|(order, m)| (m.start, Reverse(m.end), *order));

        let mut accepted: Vec<KeywordMatch> = Vec::with_capacity(candidates.len());
        for (_, candidate) in candidates {
            if let Some(last) = accepted.last() {
                if candidate.start < last.end {
                    continue;
                }
            }
            accepted.push(candidate);
        }

        accepted
    }
}

/// Regex source for a literal phrase where any whitespace run matches any
/// other whitespace run.
pub(crate) fn keyword_pattern(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

/// Keyword pattern with `\b` on each end that is a word character. Ends
/// that are punctuation are checked by [`stands_alone`] instead.
fn bounded_keyword_pattern(keyword: &str) -> String {
    let mut pattern = keyword_pattern(keyword);
    if keyword.chars().next().is_some_and(is_word_char) {
        pattern.insert_str(0, r"\b");
    }
    if keyword.chars().last().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// No word character directly before `start` or after `end`.
fn stands_alone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}
