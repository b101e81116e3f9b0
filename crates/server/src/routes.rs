//! HTTP surface: one chat endpoint plus health reporting.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use greencart_agent::{ChatRequest, ChatResponse, Orchestrator};
use greencart_core::Provenance;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .with_state(AppState { orchestrator })
}

/// Turn failures are reported in-band via the response `status` and `error`
/// fields, so the HTTP layer always answers 200 once a request parses.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let correlation_id = Uuid::new_v4().to_string();

    let response = state.orchestrator.handle(request, &correlation_id).await;

    info!(
        event_name = "http.chat.completed",
        correlation_id,
        status = response.status.as_str(),
        "chat turn completed"
    );
    (StatusCode::OK, Json(response))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = match state.orchestrator.catalog_provenance().await {
        Some(Provenance::Live) => {
            HealthCheck { status: "ready", detail: "serving live catalog".to_string() }
        }
        Some(Provenance::Cached) => {
            HealthCheck { status: "ready", detail: "serving cached catalog".to_string() }
        }
        Some(Provenance::Bundled) => HealthCheck {
            status: "degraded",
            detail: "serving bundled catalog, backend unreachable".to_string(),
        },
        None => HealthCheck { status: "ready", detail: "no catalog fetch yet".to_string() },
    };
    let ready = catalog.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "greencart-server runtime initialized".to_string(),
        },
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
