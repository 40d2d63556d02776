//! GET /api/health - process liveness.

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report = state.gateway.health();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": report.active_sessions,
        "pending_messages": report.pending_messages,
        "uptime_secs": report.uptime_secs,
        "timestamp": report.timestamp,
    }))
}
