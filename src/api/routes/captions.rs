//! Caption ingestion endpoint.
//!
//! Lets any external captioner push lines over HTTP (POST /captions). Events
//! join the same queue as the other caption sources.

use crate::api::error::{ApiError, ApiResult};
use crate::captions::{SpeakerTracker, TranscriptEvent};
use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionRequest {
    pub text: String,
    /// When absent, a `Name: text` or `[Name] text` prefix is honored.
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CaptionState {
    pub tx: mpsc::Sender<TranscriptEvent>,
    pub speakers: Arc<Mutex<SpeakerTracker>>,
}

pub fn router(state: CaptionState) -> Router {
    Router::new()
        .route("/captions", post(ingest_caption))
        .with_state(state)
}

async fn ingest_caption(
    State(state): State<CaptionState>,
    Json(req): Json<CaptionRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let timestamp = req.timestamp.unwrap_or_else(Utc::now);

    let event = {
        let mut speakers = state.speakers.lock().await;
        match req.speaker.filter(|s| !s.trim().is_empty()) {
            Some(speaker) => {
                let (speaker, trusted) = speakers.resolve(Some(speaker), timestamp);
                TranscriptEvent::new(req.text.trim(), speaker, timestamp, trusted)
            }
            None => speakers.event_from_line(&req.text, timestamp),
        }
    };

    debug!(
        "Caption received via API from {:?} (trusted: {})",
        event.speaker, event.is_trusted_speaker
    );

    let response = json!({
        "accepted": true,
        "speaker": event.speaker,
        "trusted": event.is_trusted_speaker,
    });

    state.tx.send(event).await.map_err(|e| {
        error!("Failed to queue caption: {}", e);
        ApiError::unavailable("Caption queue is closed")
    })?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}
