use crate::db::models::{Content, ContentId, ContentMetrics, ContentWithMetrics};
use crate::middleware::CurrentCreator;
use crate::service::SubmissionRequest;
use crate::{BoardError, router::BoardState};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetail {
    #[serde(flatten)]
    pub content: Content,
    pub metrics: Vec<ContentMetrics>,
}

/// GET /api/content
pub async fn list_content(
    State(state): State<BoardState>,
    CurrentCreator(creator): CurrentCreator,
) -> Result<Json<Vec<ContentWithMetrics>>, BoardError> {
    Ok(Json(state.storage.list_content_for_creator(creator.id).await?))
}

/// POST /api/content/submit
pub async fn submit_content(
    State(state): State<BoardState>,
    CurrentCreator(creator): CurrentCreator,
    Json(req): Json<SubmissionRequest>,
) -> Result<(StatusCode, Json<ContentWithMetrics>), BoardError> {
    let item = state.submissions.submit(&creator, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/content/{id}
pub async fn get_content(
    State(state): State<BoardState>,
    CurrentCreator(creator): CurrentCreator,
    Path(id): Path<ContentId>,
) -> Result<Json<ContentDetail>, BoardError> {
    let content = state.storage.require_content(id).await?;
    if content.creator_id != creator.id && !creator.is_super_admin {
        // same answer as a missing row
        return Err(BoardError::NotFound("Content not found".to_string()));
    }
    let metrics = state.storage.metrics_history(id).await?;
    Ok(Json(ContentDetail { content, metrics }))
}

/// DELETE /api/content/{id}
pub async fn delete_content(
    State(state): State<BoardState>,
    CurrentCreator(creator): CurrentCreator,
    Path(id): Path<ContentId>,
) -> Result<Json<Value>, BoardError> {
    state.submissions.delete_content(&creator, id).await?;
    Ok(Json(json!({ "success": true })))
}
