use crate::db::models::{
    ConnectionSummary, Content, ContentId, Creator, CreatorId, CreatorUpdate, ContentWithMetrics,
    ValidationStatus,
};
use crate::middleware::SuperAdmin;
use crate::service::scoring::recompute_creator_score;
use crate::service::{SubmissionRequest, SyncReport};
use crate::{BoardError, router::BoardState};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: ValidationStatus,
}

/// GET /api/admin/creators/search?q=
pub async fn search_creators(
    State(state): State<BoardState>,
    SuperAdmin(_admin): SuperAdmin,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Creator>>, BoardError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(BoardError::BadRequest("Query parameter `q` is required".to_string()));
    }
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    Ok(Json(state.storage.search_creators(q, limit).await?))
}

/// PATCH /api/admin/creators/{id}
pub async fn update_creator(
    State(state): State<BoardState>,
    SuperAdmin(admin): SuperAdmin,
    Path(id): Path<CreatorId>,
    Json(update): Json<CreatorUpdate>,
) -> Result<Json<Creator>, BoardError> {
    let mut creator = state.storage.update_creator(id, &update).await?;
    // keep total = content + referral unless the total was set explicitly
    if update.total_points.is_none()
        && (update.content_points.is_some() || update.referral_points.is_some())
    {
        state
            .storage
            .update_scores(id, creator.content_points)
            .await?;
        creator = state.storage.require_creator(id).await?;
    }
    info!(admin_id = admin.id, creator_id = id, "creator updated");
    Ok(Json(creator))
}

/// POST /api/admin/content/submit
pub async fn submit_content(
    State(state): State<BoardState>,
    SuperAdmin(admin): SuperAdmin,
    Json(req): Json<SubmissionRequest>,
) -> Result<(StatusCode, Json<ContentWithMetrics>), BoardError> {
    if req.creator_id.is_none() {
        return Err(BoardError::BadRequest("`creatorId` is required".to_string()));
    }
    let item = state.submissions.submit(&admin, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/admin/content/{id}/status
pub async fn set_content_status(
    State(state): State<BoardState>,
    SuperAdmin(admin): SuperAdmin,
    Path(id): Path<ContentId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Content>, BoardError> {
    let content = state.storage.set_validation_status(id, body.status).await?;
    recompute_creator_score(
        &state.storage,
        &state.config.scoring,
        content.creator_id,
        Utc::now(),
    )
    .await?;
    info!(admin_id = admin.id, content_id = id, status = body.status.as_str(), "content status set");
    Ok(Json(content))
}

/// POST /api/admin/sync
pub async fn trigger_sync(
    State(state): State<BoardState>,
    SuperAdmin(admin): SuperAdmin,
) -> Result<Json<SyncReport>, BoardError> {
    info!(admin_id = admin.id, "manual sync requested");
    Ok(Json(state.sync.run_once().await?))
}

/// GET /api/debug/connections
pub async fn debug_connections(
    State(state): State<BoardState>,
    SuperAdmin(_admin): SuperAdmin,
) -> Result<Json<Vec<ConnectionSummary>>, BoardError> {
    let rows = state.storage.list_connections().await?;
    Ok(Json(rows.iter().map(ConnectionSummary::from).collect()))
}
