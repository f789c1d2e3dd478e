//! Local REST API for Ditto.
//!
//! Provides HTTP endpoints for:
//! - Session status (GET /status)
//! - Caption ingestion from external captioners (POST /captions)

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::captions::{CaptionRequest, CaptionState};
pub use routes::session::SessionState;

pub struct ApiServer {
    port: u16,
    session_state: SessionState,
    caption_state: Option<CaptionState>,
}

impl ApiServer {
    /// `caption_state` mounts POST /captions; leave it out when another
    /// source feeds the controller.
    pub fn new(
        port: u16,
        session_state: SessionState,
        caption_state: Option<CaptionState>,
    ) -> Self {
        Self {
            port,
            session_state,
            caption_state,
        }
    }

    pub fn router(self) -> Router {
        let mut app = Router::new()
            .route("/", get(service_info))
            .merge(routes::session::router(self.session_state));

        if let Some(caption_state) = self.caption_state {
            app = app.merge(routes::captions::router(caption_state));
        }

        app.layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let port = self.port;
        let accepts_captions = self.caption_state.is_some();
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", port)).await?;

        info!("API server listening on http://127.0.0.1:{}", port);
        info!("Endpoints:");
        info!("  GET  /              - Service info");
        info!("  GET  /status        - Command session status");
        if accepts_captions {
            info!("  POST /captions      - Submit a caption line");
        }

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "ditto",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
