//! REST + SSE API server for the trading strategy orchestrator
//!
//! Exposes the orchestrator via HTTP endpoints
//! Streams workflow events for live dashboards

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agents::AnalystRole;
use crate::error::OrchestrationError;
use crate::orchestrator::Orchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StrategyRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub query: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

fn status_for(error: &OrchestrationError) -> StatusCode {
    match error {
        OrchestrationError::EmptyQuery => StatusCode::BAD_REQUEST,
        OrchestrationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        OrchestrationError::CollaboratorUnavailable(_) | OrchestrationError::LlmError(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let start = Instant::now();

    let registered = state.orchestrator.registry().registered_roles().await;
    let agents: Vec<serde_json::Value> = AnalystRole::ALL
        .iter()
        .map(|role| {
            serde_json::json!({
                "id": role.as_str(),
                "status": if registered.contains(role) { "ready" } else { "idle" },
            })
        })
        .collect();

    Json(serde_json::json!({
        "status": "healthy",
        "registry_healthy": true,
        "agents": agents,
        "api_latency_ms": start.elapsed().as_millis() as u64,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Single-Shot Strategy Endpoint
/// =============================

async fn run_strategy(
    State(state): State<ApiState>,
    Json(req): Json<StrategyRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!("Received strategy request: {}", req.query);

    match state.orchestrator.run_workflow(&req.query).await {
        Ok(strategy) => (StatusCode::OK, Json(ApiResponse::success(strategy))),
        Err(e) => {
            warn!(error = %e, "Strategy request failed");
            (
                status_for(&e),
                Json(ApiResponse::error(format!("Orchestration failed: {}", e))),
            )
        }
    }
}

/// =============================
/// Streaming Endpoint
/// =============================

async fn stream_strategy(
    State(state): State<ApiState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    info!("Received stream request: {}", params.query);

    let events = state
        .orchestrator
        .clone()
        .stream(params.query)
        .map(|event| Event::default().json_data(event));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/strategy", post(run_strategy))
        .route("/stream", get(stream_strategy))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
