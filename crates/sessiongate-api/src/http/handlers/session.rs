//! Session lifecycle and query HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/sessions                    - Create a session
//! - GET    /api/sessions                    - List sessions in creation order
//! - GET    /api/sessions/{user_id}/qr       - Pending challenge or connected
//! - GET    /api/sessions/{user_id}/status   - Re-synced session status
//! - GET    /api/sessions/{user_id}/history  - Recent messages, newest first
//! - GET    /api/sessions/{user_id}/pending  - In-flight and recent sends
//! - DELETE /api/sessions/{user_id}          - Tear the session down

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use sessiongate_core::service::HistoryPage;
use sessiongate_types::message::PendingMessage;
use sessiongate_types::session::{QrStatus, SessionSummary, UserId};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body of `POST /api/sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default, alias = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PendingList {
    pub user_id: UserId,
    pub messages: Vec<PendingMessage>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct Destroyed {
    pub user_id: String,
    pub destroyed: bool,
}

/// POST /api/sessions - Create a session for a user.
///
/// Returns immediately; the challenge arrives later through `/qr`.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<ApiResponse<SessionSummary>>, AppError> {
    let start = Instant::now();
    let session = state.gateway.create_session(&body.user_id)?;
    let id = session.user_id.to_string();

    Ok(Json(
        ApiResponse::success(session.summary(), start)
            .with_link("qr", &format!("/api/sessions/{id}/qr"))
            .with_link("status", &format!("/api/sessions/{id}/status")),
    ))
}

/// GET /api/sessions - List all sessions.
pub async fn list_sessions(State(state): State<AppState>) -> Json<ApiResponse<SessionList>> {
    let start = Instant::now();
    let sessions = state.gateway.list_sessions();
    let total = sessions.len();
    Json(ApiResponse::success(SessionList { sessions, total }, start))
}

/// GET /api/sessions/{user_id}/qr
pub async fn get_qr(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<QrStatus>>, AppError> {
    let start = Instant::now();
    let qr = state.gateway.qr_status(&user_id).await?;
    Ok(Json(ApiResponse::success(qr, start)))
}

/// GET /api/sessions/{user_id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<SessionSummary>>, AppError> {
    let start = Instant::now();
    let session = state.gateway.session_status(&user_id).await?;
    Ok(Json(ApiResponse::success(session.summary(), start)))
}

/// GET /api/sessions/{user_id}/history?limit=N
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<HistoryPage>>, AppError> {
    let start = Instant::now();
    let page = state.gateway.list_history(&user_id, query.limit)?;
    Ok(Json(ApiResponse::success(page, start)))
}

/// GET /api/sessions/{user_id}/pending
pub async fn get_pending(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<PendingList>>, AppError> {
    let start = Instant::now();
    let messages = state.gateway.list_pending(&user_id)?;
    let user_id = UserId::parse(&user_id)?;
    let total = messages.len();
    Ok(Json(ApiResponse::success(
        PendingList {
            user_id,
            messages,
            total,
        },
        start,
    )))
}

/// DELETE /api/sessions/{user_id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Destroyed>>, AppError> {
    let start = Instant::now();
    state.gateway.destroy_session(&user_id).await?;
    Ok(Json(ApiResponse::success(
        Destroyed {
            user_id: user_id.trim().to_string(),
            destroyed: true,
        },
        start,
    )))
}
