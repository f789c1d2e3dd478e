use crate::command::{FieldExtractor, KeywordSpec};
use crate::global;
use crate::tracker::linear::DEFAULT_API_URL;
use crate::tracker::resolver::DEFAULT_TITLE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub parsing: ParsingConfig,
    pub captions: CaptionsConfig,
    pub session: SessionConfig,
    pub slack: SlackConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    /// Title used when no title was dictated.
    pub default_title: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: Some(DEFAULT_API_URL.to_string()),
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// A field's keywords: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordList {
    One(String),
    Many(Vec<String>),
}

impl KeywordList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(keyword) => vec![keyword.clone()],
            Self::Many(keywords) => keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub trigger_phrase: String,
    pub field_keywords: BTreeMap<String, KeywordList>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        let one = |field: &str, keyword: &str| (field.to_string(), KeywordList::One(keyword.to_string()));

        Self {
            trigger_phrase: "please create issue".to_string(),
            field_keywords: BTreeMap::from([
                one("team", "team"),
                one("project", "project"),
                one("cycle", "cycle"),
                one("due_date", "due date"),
                one("priority", "priority"),
                one("assignee", "assignee"),
                (
                    "label".to_string(),
                    KeywordList::Many(vec!["label".to_string(), "labels".to_string()]),
                ),
                one("title", "title"),
                one("description", "description"),
            ]),
        }
    }
}

impl ParsingConfig {
    pub fn keyword_spec(&self) -> Result<KeywordSpec> {
        KeywordSpec::new(
            self.field_keywords
                .iter()
                .map(|(field, keywords)| (field.clone(), keywords.to_vec())),
        )
    }

    /// Build the extractor, optionally with a different trigger phrase.
    pub fn extractor(&self, trigger_override: Option<&str>) -> Result<FieldExtractor> {
        let trigger = trigger_override.unwrap_or(&self.trigger_phrase);
        FieldExtractor::new(trigger, self.keyword_spec()?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptionSourceKind {
    #[default]
    File,
    Stdin,
    Http,
}

impl CaptionSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stdin => "stdin",
            Self::Http => "http",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    pub source: CaptionSourceKind,
    /// Speakers allowed to open a command.
    pub trusted_speakers: Vec<String>,
    /// How long an unnamed caption line inherits the previous speaker.
    pub speaker_window_seconds: u64,
    /// Caption file to follow; probed from known locations when unset.
    pub caption_file: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub replay_existing: bool,
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            source: CaptionSourceKind::File,
            trusted_speakers: Vec::new(),
            speaker_window_seconds: 2,
            caption_file: None,
            poll_interval_ms: 500,
            replay_existing: false,
        }
    }
}

impl CaptionsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub quiescence_ms: u64,
    /// Abandon a collecting session after this much silence (off when unset).
    pub idle_expiry_seconds: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: 2000,
            idle_expiry_seconds: None,
        }
    }
}

impl SessionConfig {
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn idle_expiry(&self) -> Option<Duration> {
        self.idle_expiry_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub channel: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            channel: crate::notify::slack::DEFAULT_CHANNEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3747,
        }
    }
}

impl Config {
    /// Load from `path`, or the standard location when `None`. A missing
    /// file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => global::config_file()?,
        };

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save(&config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}
