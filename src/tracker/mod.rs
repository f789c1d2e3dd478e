//! Issue tracker backend.
//!
//! The controller hands every finalized [`FieldMap`] to an [`IssueBackend`],
//! which resolves fields against the tracker's own data and creates the
//! record. [`IssueResolver`] implements the field policy on top of any
//! [`TrackerDirectory`]; [`LinearClient`] is the GraphQL directory.

pub mod due_date;
pub mod linear;
pub mod resolver;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::command::FieldMap;
use crate::error::CommandResult;

pub use linear::LinearClient;
pub use resolver::IssueResolver;

/// Outcome of a successful create: the record plus what was kept and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedIssue {
    pub identifier: String,
    pub url: String,
    pub applied_fields: BTreeMap<String, String>,
    pub ignored_fields: Vec<String>,
}

/// Validates a field map and creates the record it describes.
#[async_trait]
pub trait IssueBackend: Send + Sync {
    async fn create_issue(&self, fields: &FieldMap) -> CommandResult<CreatedIssue>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    pub id: String,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cycle {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub number: u32,
}

impl Cycle {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Cycle {}", self.number))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Spoken priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "urgent" => Some(Self::Urgent),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Numeric level used by the tracker (0 means none, 1 is most urgent).
    pub fn level(&self) -> u8 {
        match self {
            Self::Urgent => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
        }
    }
}

/// Fully resolved record ready to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub team_id: String,
    pub title: String,
    pub description: String,
    pub project_id: Option<String>,
    pub cycle_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<String>,
    pub label_ids: Vec<String>,
}

/// Record returned by the tracker after creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueRecord {
    pub id: String,
    pub identifier: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Read access to the tracker's authoritative data plus record creation.
#[async_trait]
pub trait TrackerDirectory: Send + Sync {
    async fn teams(&self) -> CommandResult<Vec<Team>>;

    async fn projects(&self, team_id: &str) -> CommandResult<Vec<Project>>;

    /// Cycles currently active for a team.
    async fn active_cycles(&self, team_id: &str) -> CommandResult<Vec<Cycle>>;

    async fn users(&self) -> CommandResult<Vec<User>>;

    async fn labels(&self, team_id: &str) -> CommandResult<Vec<Label>>;

    async fn create_issue(&self, draft: &IssueDraft) -> CommandResult<IssueRecord>;
}
