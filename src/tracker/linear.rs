use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::{Cycle, IssueDraft, IssueRecord, Label, Project, Team, TrackerDirectory, User};
use crate::error::{CommandError, CommandResult};

pub const DEFAULT_API_URL: &str = "https://api.linear.app/graphql";

const TEAMS_QUERY: &str = r#"
query {
    teams {
        nodes { id key name }
    }
}"#;

const PROJECTS_QUERY: &str = r#"
query($teamId: String!) {
    team(id: $teamId) {
        projects {
            nodes { id name }
        }
    }
}"#;

const CYCLES_QUERY: &str = r#"
query($teamId: String!) {
    team(id: $teamId) {
        cycles(filter: { isActive: { eq: true } }) {
            nodes { id name number }
        }
    }
}"#;

const USERS_QUERY: &str = r#"
query {
    users {
        nodes { id name email }
    }
}"#;

const LABELS_QUERY: &str = r#"
query($teamId: ID) {
    issueLabels(filter: { team: { id: { eq: $teamId } } }) {
        nodes { id name }
    }
}"#;

const CREATE_ISSUE_MUTATION: &str = r#"
mutation($input: IssueCreateInput!) {
    issueCreate(input: $input) {
        success
        issue { id identifier url title }
    }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TeamsData {
    teams: Nodes<Team>,
}

#[derive(Debug, Deserialize)]
struct TeamData<T> {
    team: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TeamProjects {
    projects: Nodes<Project>,
}

#[derive(Debug, Deserialize)]
struct TeamCycles {
    cycles: Nodes<Cycle>,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    users: Nodes<User>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelsData {
    issue_labels: Nodes<Label>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCreateData {
    issue_create: IssueCreatePayload,
}

#[derive(Debug, Deserialize)]
struct IssueCreatePayload {
    success: bool,
    issue: Option<IssueRecord>,
}

/// Mutation input; absent optionals are left out entirely.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueCreateInput<'a> {
    team_id: &'a str,
    title: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee_id: Option<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    label_ids: &'a [String],
}

impl<'a> From<&'a IssueDraft> for IssueCreateInput<'a> {
    fn from(draft: &'a IssueDraft) -> Self {
        Self {
            team_id: &draft.team_id,
            title: &draft.title,
            description: &draft.description,
            project_id: draft.project_id.as_deref(),
            cycle_id: draft.cycle_id.as_deref(),
            due_date: draft.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            priority: draft.priority.map(|p| p.level()),
            assignee_id: draft.assignee_id.as_deref(),
            label_ids: &draft.label_ids,
        }
    }
}

/// GraphQL client for the Linear issue tracker.
pub struct LinearClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl LinearClient {
    pub fn new(api_key: &str, api_url: Option<String>) -> Self {
        // Personal API keys are sent bare, without the Bearer scheme.
        let api_key = api_key
            .trim()
            .strip_prefix("Bearer ")
            .unwrap_or(api_key.trim())
            .trim()
            .to_string();
        let api_url = api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());

        info!("Initialized tracker client with API URL: {}", api_url);

        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url,
        }
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> CommandResult<T> {
        debug!("Tracker query: {}", query.split_whitespace().take(3).collect::<Vec<_>>().join(" "));

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed: Option<GraphQlResponse<T>> = serde_json::from_str(&body).ok();

        if let Some(parsed) = &parsed {
            if !parsed.errors.is_empty() {
                let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
                error!("Tracker GraphQL errors: {}", messages.join("; "));
                return Err(CommandError::Api(format!("GraphQL error: {}", messages.join("; "))));
            }
        }

        if !status.is_success() {
            error!("Tracker request failed with status {}: {}", status, body);
            return Err(CommandError::Api(format!(
                "request failed with status {}: {}",
                status, body
            )));
        }

        match parsed {
            Some(GraphQlResponse { data: Some(data), .. }) => Ok(data),
            Some(_) => Err(CommandError::Api("response contained no data".to_string())),
            None => {
                // Re-parse to surface the decode error itself.
                let parsed: GraphQlResponse<T> = serde_json::from_str(&body)?;
                parsed
                    .data
                    .ok_or_else(|| CommandError::Api("response contained no data".to_string()))
            }
        }
    }
}

#[async_trait]
impl TrackerDirectory for LinearClient {
    async fn teams(&self) -> CommandResult<Vec<Team>> {
        let data: TeamsData = self.query(TEAMS_QUERY, json!({})).await?;
        Ok(data.teams.nodes)
    }

    async fn projects(&self, team_id: &str) -> CommandResult<Vec<Project>> {
        let data: TeamData<TeamProjects> =
            self.query(PROJECTS_QUERY, json!({ "teamId": team_id })).await?;
        Ok(data.team.map(|t| t.projects.nodes).unwrap_or_default())
    }

    async fn active_cycles(&self, team_id: &str) -> CommandResult<Vec<Cycle>> {
        let data: TeamData<TeamCycles> =
            self.query(CYCLES_QUERY, json!({ "teamId": team_id })).await?;
        Ok(data.team.map(|t| t.cycles.nodes).unwrap_or_default())
    }

    async fn users(&self) -> CommandResult<Vec<User>> {
        let data: UsersData = self.query(USERS_QUERY, json!({})).await?;
        Ok(data.users.nodes)
    }

    async fn labels(&self, team_id: &str) -> CommandResult<Vec<Label>> {
        let data: LabelsData = self.query(LABELS_QUERY, json!({ "teamId": team_id })).await?;
        Ok(data.issue_labels.nodes)
    }

    async fn create_issue(&self, draft: &IssueDraft) -> CommandResult<IssueRecord> {
        let input = IssueCreateInput::from(draft);
        let data: IssueCreateData = self
            .query(CREATE_ISSUE_MUTATION, json!({ "input": input }))
            .await?;

        match data.issue_create {
            IssueCreatePayload {
                success: true,
                issue: Some(issue),
            } => Ok(issue),
            _ => Err(CommandError::Api("issue creation was not successful".to_string())),
        }
    }
}
