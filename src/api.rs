//! REST endpoints for the guard catalog and violation history.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::guards::GuardEngine;
use crate::store::ViolationLog;

const DEFAULT_VIOLATION_LIMIT: usize = 50;
const MAX_VIOLATION_LIMIT: usize = 500;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: GuardEngine,
    pub log: Arc<dyn ViolationLog>,
}

/// Build the Axum router with catalog and violation routes.
pub fn guard_routes(engine: GuardEngine, log: Arc<dyn ViolationLog>) -> Router {
    let state = AppState { engine, log };

    Router::new()
        .route("/health", get(health))
        .route("/api/guards", get(list_guards))
        .route("/api/guards/{id}", get(get_guard))
        .route("/api/groups/{chat_id}/violations", get(list_violations))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "groupguard"
    }))
}

// ── Guards ──────────────────────────────────────────────────────────────

async fn list_guards(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.list_guards())
}

async fn get_guard(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.engine.lookup_guard(&id) {
        Some(guard) => (
            StatusCode::OK,
            Json(serde_json::to_value(guard.info()).unwrap_or_default()),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown guard: {id}") })),
        ),
    }
}

// ── Violations ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ViolationQuery {
    limit: Option<usize>,
}

async fn list_violations(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<ViolationQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_VIOLATION_LIMIT)
        .min(MAX_VIOLATION_LIMIT);

    match state.log.recent_violations(&chat_id, limit).await {
        Ok(records) => (
            StatusCode::OK,
            Json(serde_json::to_value(records).unwrap_or_default()),
        ),
        Err(e) => {
            error!(chat_id = %chat_id, error = %e, "Failed to read violations");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to read violations" })),
            )
        }
    }
}
