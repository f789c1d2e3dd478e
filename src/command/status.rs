//! Session status types and shared state handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::session::CommandOutcome;

/// Phase of the command session machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Collecting,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
        }
    }
}

/// Summary of the most recently finalized command.
#[derive(Debug, Clone, Serialize)]
pub struct LastCommand {
    pub finished_at: DateTime<Utc>,
    pub identifier: Option<String>,
    pub url: Option<String>,
    pub ignored_fields: Vec<String>,
    pub error: Option<String>,
}

/// Current session state, readable by API handlers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub trigger_time: Option<DateTime<Utc>>,
    pub buffered_segments: usize,
    pub commands_created: u64,
    pub commands_failed: u64,
    pub last_command: Option<LastCommand>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            trigger_time: None,
            buffered_segments: 0,
            commands_created: 0,
            commands_failed: 0,
            last_command: None,
        }
    }
}

/// Thread-safe handle for sharing session state between the controller and API handlers.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionStatus>>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionStatus {
        self.inner.lock().await.clone()
    }

    pub async fn start_collecting(&self, trigger_time: DateTime<Utc>, buffered_segments: usize) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Collecting;
        state.trigger_time = Some(trigger_time);
        state.buffered_segments = buffered_segments;
    }

    pub async fn set_buffered(&self, buffered_segments: usize) {
        let mut state = self.inner.lock().await;
        state.buffered_segments = buffered_segments;
    }

    /// Back to idle; counters and the last command summary survive.
    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Idle;
        state.trigger_time = None;
        state.buffered_segments = 0;
    }

    pub async fn record_outcome(&self, outcome: &CommandOutcome, finished_at: DateTime<Utc>) {
        let mut state = self.inner.lock().await;
        let summary = match outcome {
            CommandOutcome::Created(issue) => {
                state.commands_created += 1;
                LastCommand {
                    finished_at,
                    identifier: Some(issue.identifier.clone()),
                    url: Some(issue.url.clone()),
                    ignored_fields: issue.ignored_fields.clone(),
                    error: None,
                }
            }
            CommandOutcome::Failed(message) => {
                state.commands_failed += 1;
                LastCommand {
                    finished_at,
                    identifier: None,
                    url: None,
                    ignored_fields: Vec::new(),
                    error: Some(message.clone()),
                }
            }
        };
        state.last_command = Some(summary);
    }
}
