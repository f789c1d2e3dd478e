//! Session status endpoint (GET /status).

use crate::command::{SessionPhase, SessionStatusHandle};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

#[derive(Clone)]
pub struct SessionState {
    pub status: SessionStatusHandle,
    pub trigger_phrase: String,
    pub caption_source: &'static str,
}

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/status", get(session_status))
        .with_state(state)
}

/// Current phase, buffered segment count and the last finalized command.
async fn session_status(State(state): State<SessionState>) -> Json<Value> {
    let status = state.status.get().await;

    Json(json!({
        "collecting": status.phase == SessionPhase::Collecting,
        "phase": status.phase.as_str(),
        "trigger_phrase": state.trigger_phrase,
        "caption_source": state.caption_source,
        "trigger_time": status.trigger_time,
        "buffered_segments": status.buffered_segments,
        "commands_created": status.commands_created,
        "commands_failed": status.commands_failed,
        "last_command": status.last_command,
    }))
}
