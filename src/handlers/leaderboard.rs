use crate::db::LeaderboardFilter;
use crate::db::models::LeaderboardEntry;
use crate::{BoardError, router::BoardState};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub region: Option<String>,
    pub tier: Option<String>,
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub creators: Vec<LeaderboardEntry>,
    pub limit: i64,
    pub offset: i64,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// GET /api/leaderboard/creators
pub async fn creators(
    State(state): State<BoardState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, BoardError> {
    let filter = LeaderboardFilter {
        limit: query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset: query.offset.unwrap_or(0).max(0),
        region: non_empty(query.region),
        tier: non_empty(query.tier),
    };
    let creators = state.storage.leaderboard(&filter).await?;
    Ok(Json(LeaderboardResponse {
        creators,
        limit: filter.limit,
        offset: filter.offset,
    }))
}
