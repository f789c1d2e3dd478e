//! Field resolution policy.
//!
//! `team` is the only required field. Every other field is optional: when
//! the tracker cannot resolve it, it is left off the record and reported
//! back as ignored.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::due_date::parse_due_date;
use super::{CreatedIssue, IssueBackend, IssueDraft, Priority, TrackerDirectory};
use crate::command::{Clock, FieldMap, SystemClock};
use crate::error::{CommandError, CommandResult};

pub const DEFAULT_TITLE: &str = "Issue created from meeting";

const TEAM_HINT_LIMIT: usize = 5;

pub struct IssueResolver<D> {
    directory: D,
    default_title: String,
    clock: Arc<dyn Clock>,
}

impl<D: TrackerDirectory> IssueResolver<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            default_title: DEFAULT_TITLE.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Resolve every field into a draft plus the applied/ignored report.
    pub async fn resolve(
        &self,
        fields: &FieldMap,
    ) -> CommandResult<(IssueDraft, BTreeMap<String, String>, Vec<String>)> {
        let mut applied = BTreeMap::new();
        let mut ignored = Vec::new();

        let team_value = fields
            .text("team")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CommandError::MissingRequiredField("team".to_string()))?;

        let teams = self.directory.teams().await?;
        let wanted = normalize(team_value);
        let team = teams
            .iter()
            .find(|t| normalize(&t.key) == wanted || normalize(&t.name) == wanted)
            .ok_or_else(|| CommandError::UnresolvableRequiredField {
                field: "team".to_string(),
                value: team_value.to_string(),
                hint: format!(
                    "Available teams: {}",
                    teams
                        .iter()
                        .take(TEAM_HINT_LIMIT)
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })?;
        applied.insert("team".to_string(), team.name.clone());

        let title = fields
            .text("title")
            .map(str::to_string)
            .unwrap_or_else(|| self.default_title.clone());
        applied.insert("title".to_string(), title.clone());

        let mut project_id = None;
        if let Some(value) = fields.text("project") {
            let projects = self.directory.projects(&team.id).await?;
            match projects.iter().find(|p| normalize(&p.name) == normalize(value)) {
                Some(project) => {
                    project_id = Some(project.id.clone());
                    applied.insert("project".to_string(), project.name.clone());
                }
                None => ignored.push("project (not found)".to_string()),
            }
        }

        let mut cycle_id = None;
        if let Some(value) = fields.text("cycle") {
            let cycles = self.directory.active_cycles(&team.id).await?;
            let wanted = normalize(value);
            let number = wanted
                .strip_prefix("sprint")
                .or_else(|| wanted.strip_prefix("cycle"))
                .unwrap_or(&wanted)
                .trim()
                .to_string();
            let found = cycles.iter().find(|c| {
                c.name.as_deref().map(normalize).as_deref() == Some(wanted.as_str())
                    || c.number.to_string() == wanted
                    || c.number.to_string() == number
            });
            match found {
                Some(cycle) => {
                    cycle_id = Some(cycle.id.clone());
                    applied.insert("cycle".to_string(), cycle.display_name());
                }
                None => ignored.push("cycle (not found)".to_string()),
            }
        }

        let mut due_date = None;
        if let Some(value) = fields.text("due_date") {
            match parse_due_date(value, self.clock.now().date_naive()) {
                Some(date) => {
                    due_date = Some(date);
                    applied.insert("due_date".to_string(), date.format("%Y-%m-%d").to_string());
                }
                None => ignored.push("due_date (cannot parse)".to_string()),
            }
        }

        let mut priority = None;
        if let Some(value) = fields.text("priority") {
            match Priority::parse(value) {
                Some(p) => {
                    priority = Some(p);
                    applied.insert("priority".to_string(), p.as_str().to_string());
                }
                None => ignored.push("priority (invalid)".to_string()),
            }
        }

        let mut assignee_id = None;
        if let Some(value) = fields.text("assignee") {
            let users = self.directory.users().await?;
            let wanted = normalize(value);
            let found = users.iter().find(|u| {
                normalize(&u.name) == wanted
                    || u.email.as_deref().map(normalize).as_deref() == Some(wanted.as_str())
            });
            match found {
                Some(user) => {
                    assignee_id = Some(user.id.clone());
                    applied.insert("assignee".to_string(), user.name.clone());
                }
                None => ignored.push("assignee (not found)".to_string()),
            }
        }

        let mut label_ids = Vec::new();
        if !fields.labels().is_empty() {
            let labels = self.directory.labels(&team.id).await?;
            let mut names = Vec::new();
            for value in fields.labels() {
                match labels.iter().find(|l| normalize(&l.name) == normalize(value)) {
                    Some(label) if !label_ids.contains(&label.id) => {
                        label_ids.push(label.id.clone());
                        names.push(label.name.clone());
                    }
                    Some(_) => debug!("Label {} already applied", value),
                    None => ignored.push(format!("label {} (not found)", value)),
                }
            }
            if !names.is_empty() {
                applied.insert("labels".to_string(), names.join(", "));
            }
        }

        let description = self.describe(fields.text("description"), &applied);

        let draft = IssueDraft {
            team_id: team.id.clone(),
            title,
            description,
            project_id,
            cycle_id,
            due_date,
            priority,
            assignee_id,
            label_ids,
        };

        Ok((draft, applied, ignored))
    }

    fn describe(&self, spoken: Option<&str>, applied: &BTreeMap<String, String>) -> String {
        let mut parts = vec![format!(
            "Created from meeting at {}",
            self.clock.now().to_rfc3339()
        )];

        if let Some(spoken) = spoken {
            parts.push(spoken.to_string());
        }

        let summary: Vec<String> = applied
            .iter()
            .filter(|(k, _)| k.as_str() != "title")
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if !summary.is_empty() {
            parts.push(format!("Parsed fields: {}", summary.join(", ")));
        }

        parts.join("\n\n")
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[async_trait]
impl<D: TrackerDirectory> IssueBackend for IssueResolver<D> {
    async fn create_issue(&self, fields: &FieldMap) -> CommandResult<CreatedIssue> {
        let (draft, applied_fields, ignored_fields) = self.resolve(fields).await?;

        let record = self.directory.create_issue(&draft).await?;
        info!("Tracker created {} ({})", record.identifier, record.url);

        Ok(CreatedIssue {
            identifier: record.identifier,
            url: record.url,
            applied_fields,
            ignored_fields,
        })
    }
}
