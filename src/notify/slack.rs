use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::Notifier;
use crate::tracker::CreatedIssue;

pub const DEFAULT_CHANNEL: &str = "#engineering";

/// Incoming-webhook message
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    channel: &'a str,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<SlackBlock>,
}

/// Slack Block Kit block
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum SlackBlock {
    #[serde(rename = "section")]
    Section { text: SlackText },
}

/// Slack Block Kit text object
#[derive(Debug, Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    text_type: &'static str,
    text: String,
}

impl SlackBlock {
    fn markdown(text: String) -> Self {
        Self::Section {
            text: SlackText {
                text_type: "mrkdwn",
                text,
            },
        }
    }
}

/// Posts command outcomes to a Slack incoming webhook.
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    channel: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, channel: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            channel: channel
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
        }
    }

    fn created_message(&self, issue: &CreatedIssue) -> WebhookMessage<'_> {
        let mut blocks = vec![SlackBlock::markdown(format!(
            "*Created {}*\n<{}|View Issue>",
            issue.identifier, issue.url
        ))];

        if !issue.applied_fields.is_empty() {
            let applied: Vec<String> = issue
                .applied_fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            blocks.push(SlackBlock::markdown(format!(
                "*Applied:* {}",
                applied.join(", ")
            )));
        }

        if !issue.ignored_fields.is_empty() {
            blocks.push(SlackBlock::markdown(format!(
                "*Ignored:* {}",
                issue.ignored_fields.join(", ")
            )));
        }

        WebhookMessage {
            channel: &self.channel,
            text: format!("Created {}", issue.identifier),
            blocks,
        }
    }

    fn error_message(&self, message: &str) -> WebhookMessage<'_> {
        WebhookMessage {
            channel: &self.channel,
            text: format!("Ditto error: {message}"),
            blocks: Vec::new(),
        }
    }

    async fn post(&self, message: &WebhookMessage<'_>) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await
            .context("Slack webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Slack webhook returned {}: {}", status, body));
        }

        debug!(channel = %self.channel, "Slack message sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_created(&self, issue: &CreatedIssue) -> Result<()> {
        self.post(&self.created_message(issue)).await
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        self.post(&self.error_message(message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn issue(ignored: Vec<String>) -> CreatedIssue {
        let mut applied = BTreeMap::new();
        applied.insert("priority".to_string(), "high".to_string());
        applied.insert("team".to_string(), "Platform".to_string());
        CreatedIssue {
            identifier: "PLAT-7".to_string(),
            url: "https://tracker.example/PLAT-7".to_string(),
            applied_fields: applied,
            ignored_fields: ignored,
        }
    }

    #[test]
    fn test_created_message_blocks() {
        let notifier = SlackNotifier::new("http://localhost/hook", None);
        let message = notifier.created_message(&issue(vec!["cycle (not found)".to_string()]));
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["channel"], "#engineering");
        assert_eq!(value["text"], "Created PLAT-7");
        assert_eq!(
            value["blocks"][0],
            json!({
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": "*Created PLAT-7*\n<https://tracker.example/PLAT-7|View Issue>"
                }
            })
        );
        assert_eq!(
            value["blocks"][1]["text"]["text"],
            "*Applied:* priority=high, team=Platform"
        );
        assert_eq!(value["blocks"][2]["text"]["text"], "*Ignored:* cycle (not found)");
    }

    #[test]
    fn test_created_message_without_ignored() {
        let notifier = SlackNotifier::new("http://localhost/hook", Some("#triage".to_string()));
        let message = notifier.created_message(&issue(Vec::new()));
        assert_eq!(message.channel, "#triage");
        assert_eq!(message.blocks.len(), 2);
    }

    #[test]
    fn test_error_message_is_plain_text() {
        let notifier = SlackNotifier::new("http://localhost/hook", Some("  ".to_string()));
        let value = serde_json::to_value(notifier.error_message("team is required")).unwrap();
        assert_eq!(
            value,
            json!({ "channel": "#engineering", "text": "Ditto error: team is required" })
        );
    }
}
