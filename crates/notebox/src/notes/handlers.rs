//! `/api/notes` handlers.
//!
//! The listing is cached through: reads fill the cache on a miss, creates and
//! deletes drop it. The `X-Cache` header tells clients which path served them.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::{NOTES_CACHE_KEY, NOTES_CACHE_TTL, Note, NoteCreateRequest};
use crate::{app_state::AppState, error::AppError};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

fn json_with_cache_marker(payload: String, marker: &'static str) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (X_CACHE, HeaderValue::from_static(marker)),
        ],
        payload,
    )
        .into_response()
}

async fn invalidate_listing<AS: AppState>(state: &AS) {
    if let Err(e) = state.cache().delete(NOTES_CACHE_KEY).await {
        tracing::warn!(error = %e, "Failed to invalidate cache");
    }
}

#[tracing::instrument(name = "notes.list", skip_all)]
pub async fn list_notes<AS: AppState>(State(state): State<AS>) -> Result<Response, AppError> {
    match state.cache().get(NOTES_CACHE_KEY).await {
        Ok(Some(cached)) => return Ok(json_with_cache_marker(cached, "HIT")),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read notes from cache"),
    }

    let notes = state.notes().list().await?;
    let payload = serde_json::to_string(&notes)?;

    if let Err(e) = state
        .cache()
        .set(NOTES_CACHE_KEY, &payload, NOTES_CACHE_TTL)
        .await
    {
        tracing::warn!(error = %e, "Failed to cache notes");
    }

    Ok(json_with_cache_marker(payload, "MISS"))
}

#[tracing::instrument(name = "notes.create", skip_all)]
pub async fn create_note<AS: AppState>(
    State(state): State<AS>,
    body: Bytes,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let request: NoteCreateRequest =
        serde_json::from_slice(&body).map_err(|_| AppError::Validation("Invalid JSON"))?;

    let text = request.text.unwrap_or_default();
    if text.is_empty() {
        return Err(AppError::Validation("Text field is required"));
    }

    let note = state.notes().create(&text).await?;
    tracing::info!(note.id = note.id, "Note created");

    invalidate_listing(&state).await;

    Ok((StatusCode::CREATED, Json(note)))
}

#[tracing::instrument(name = "notes.delete", skip_all)]
pub async fn delete_note<AS: AppState>(
    State(state): State<AS>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id: i32 = id
        .parse()
        .map_err(|_| AppError::Validation("Invalid ID format"))?;

    if !state.notes().delete(id).await? {
        return Err(AppError::NotFound("Note not found"));
    }
    tracing::info!(note.id = id, "Note deleted");

    invalidate_listing(&state).await;

    Ok(Json(json!({ "message": "Note deleted successfully" })))
}
