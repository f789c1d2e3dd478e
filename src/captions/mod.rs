//! Caption sources.
//!
//! Anything that can produce [`TranscriptEvent`]s in arrival order can feed
//! the command controller. Sources resolve speaker trust themselves; the
//! controller only sees the resulting flag.

pub mod file_source;
pub mod stdin_source;

use crate::command::FieldExtractor;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use file_source::CaptionFileSource;
pub use stdin_source::StdinSource;

/// One captioned utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub speaker: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_trusted_speaker: bool,
}

impl TranscriptEvent {
    pub fn new(
        text: impl Into<String>,
        speaker: Option<String>,
        timestamp: DateTime<Utc>,
        is_trusted_speaker: bool,
    ) -> Self {
        Self {
            text: text.into(),
            speaker,
            timestamp,
            is_trusted_speaker,
        }
    }
}

/// A producer of caption events. Runs until the stream ends or the
/// receiving side goes away.
#[async_trait]
pub trait CaptionSource: Send {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, tx: mpsc::Sender<TranscriptEvent>) -> Result<()>;
}

/// Splits caption lines into speaker and text.
///
/// Understands `[Speaker Name] text` and `Speaker Name: text`; anything else
/// is speakerless text.
///
/// A `Name:` prefix that contains the trigger phrase or a field keyword is
/// dictation, not a speaker, and the whole line stays text.
#[derive(Debug, Clone)]
pub struct CaptionLineParser {
    bracketed: Regex,
    prefixed: Regex,
    reserved: Option<FieldExtractor>,
}

impl CaptionLineParser {
    pub fn new() -> Result<Self> {
        let bracketed = Regex::new(r"^\[([^\]]+)\]\s*(.*)$")?;
        let prefixed = Regex::new(r"^([^:：\[\]]{1,64}?)\s*[:：]\s*(.+)$")?;
        Ok(Self {
            bracketed,
            prefixed,
            reserved: None,
        })
    }

    /// Refuse `Name:` prefixes that hold this extractor's trigger or keywords.
    pub fn with_reserved(mut self, extractor: FieldExtractor) -> Self {
        self.reserved = Some(extractor);
        self
    }

    pub fn parse(&self, line: &str) -> (Option<String>, String) {
        let line = line.trim();

        if let Some(caps) = self.bracketed.captures(line) {
            let speaker = caps[1].trim();
            if !speaker.is_empty() {
                return (Some(speaker.to_string()), caps[2].trim().to_string());
            }
        }

        if let Some(caps) = self.prefixed.captures(line) {
            let speaker = caps[1].trim();
            if !speaker.is_empty() && !self.is_reserved(speaker) {
                return (Some(speaker.to_string()), caps[2].trim().to_string());
            }
        }

        (None, line.to_string())
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.reserved.as_ref().is_some_and(|extractor| {
            extractor.contains_trigger(name) || !extractor.keywords().find_matches(name).is_empty()
        })
    }
}

/// Decides whether a caption speaker may open a command.
///
/// Lines without a speaker inherit the last named speaker for a short
/// window, since captions often drop the name on continuation lines.
#[derive(Debug, Clone)]
pub struct SpeakerTracker {
    parser: CaptionLineParser,
    trusted: Vec<String>,
    window: chrono::Duration,
    last_speaker: Option<(String, DateTime<Utc>)>,
}

impl SpeakerTracker {
    pub fn new(trusted: &[String], window_seconds: u64) -> Result<Self> {
        Ok(Self {
            parser: CaptionLineParser::new()?,
            trusted: trusted
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            window: chrono::Duration::seconds(window_seconds as i64),
            last_speaker: None,
        })
    }

    /// See [`CaptionLineParser::with_reserved`].
    pub fn with_reserved(mut self, extractor: FieldExtractor) -> Self {
        self.parser = self.parser.with_reserved(extractor);
        self
    }

    pub fn is_trusted(&self, speaker: &str) -> bool {
        let speaker = speaker.trim().to_lowercase();
        self.trusted.iter().any(|t| *t == speaker)
    }

    /// Resolve the effective speaker of a line and whether it is trusted.
    pub fn resolve(
        &mut self,
        speaker: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> (Option<String>, bool) {
        let speaker = match speaker {
            Some(name) => {
                self.last_speaker = Some((name.clone(), timestamp));
                Some(name)
            }
            None => self
                .last_speaker
                .as_ref()
                .filter(|(_, seen)| timestamp - *seen <= self.window)
                .map(|(name, _)| name.clone()),
        };

        let trusted = speaker.as_deref().map(|s| self.is_trusted(s)).unwrap_or(false);
        (speaker, trusted)
    }

    /// Build an event from a raw caption line.
    pub fn event_from_line(&mut self, line: &str, timestamp: DateTime<Utc>) -> TranscriptEvent {
        let (speaker, text) = self.parser.parse(line);
        let (speaker, trusted) = self.resolve(speaker, timestamp);
        TranscriptEvent::new(text, speaker, timestamp, trusted)
    }
}
