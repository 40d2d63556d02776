//! Outbound message HTTP handlers.
//!
//! Endpoints:
//! - POST /api/sessions/{user_id}/messages        - Send text (JSON)
//! - POST /api/sessions/{user_id}/messages/media  - Send an attachment (multipart)
//!
//! Both return the dispatch acknowledgement as soon as the send is accepted.
//! The delivery outcome is only visible through `/pending` and `/history`.

use std::time::Instant;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::extract::multipart::MultipartError;
use serde::Deserialize;

use sessiongate_core::dispatch::Dispatch;
use sessiongate_types::message::DispatchAck;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body of `POST /api/sessions/{user_id}/messages`.
#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub message: String,
}

/// An uploaded file part, not yet validated.
struct FilePart {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::Validation(format!("invalid multipart body: {}", e.body_text()))
}

/// POST /api/sessions/{user_id}/messages
pub async fn send_text(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<SendTextRequest>,
) -> Result<Json<ApiResponse<DispatchAck>>, AppError> {
    let start = Instant::now();
    let dispatch = state
        .gateway
        .send_text(&user_id, &body.number, &body.message)?;
    Ok(Json(ApiResponse::success(dispatch.ack, start)))
}

/// POST /api/sessions/{user_id}/messages/media
///
/// Multipart fields: `file` (optional), `number`, `message` (caption). The
/// staged file is removed once the send resolves.
pub async fn send_media(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<DispatchAck>>, AppError> {
    let start = Instant::now();
    let mut number = String::new();
    let mut caption: Option<String> = None;
    let mut file: Option<FilePart> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "number" => number = field.text().await.map_err(multipart_error)?,
            "message" => caption = Some(field.text().await.map_err(multipart_error)?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was picked.
                if !(file_name.is_empty() && bytes.is_empty()) {
                    file = Some(FilePart {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let Some(file) = file else {
        let dispatch = state.gateway.send_media(&user_id, &number, None, caption)?;
        return Ok(Json(ApiResponse::success(dispatch.ack, start)));
    };

    let media = state
        .uploads
        .stage(&file.file_name, file.content_type.as_deref(), &file.bytes)
        .await?;
    let staged = media.path.clone();

    let Dispatch { ack, completion } =
        match state.gateway.send_media(&user_id, &number, Some(media), caption) {
            Ok(dispatch) => dispatch,
            Err(e) => {
                state.uploads.discard(&staged).await;
                return Err(e.into());
            }
        };

    let uploads = state.uploads.clone();
    tokio::spawn(async move {
        let delivered = matches!(completion.await, Ok(outcome) if outcome.result.is_ok());
        uploads.release(staged, delivered);
    });

    Ok(Json(ApiResponse::success(ack, start)))
}
