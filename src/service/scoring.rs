//! Creator score over a rolling window of metrics.
//!
//! Each content item contributes its latest snapshot inside the window.
//! Rejected items still count against the approval rate but earn no points.

use crate::config::ScoringConfig;
use crate::db::models::{CreatorId, ScoredContentRow, ValidationStatus};
use crate::db::BoardStorage;
use crate::error::BoardError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub content_score: f64,
    pub engagement_score: f64,
    pub growth_score: f64,
    pub quality_score: f64,
    /// Rounded sum of the four components, stored as content points.
    pub content_points: i64,
}

fn is_rejected(row: &ScoredContentRow) -> bool {
    row.validation_status == ValidationStatus::Rejected.as_str()
}

fn is_complete(row: &ScoredContentRow) -> bool {
    let present = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
    !row.title.trim().is_empty() && present(&row.description) && present(&row.thumbnail_url)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Score a creator's in-window rows as of `now`.
pub fn compute_score(rows: &[ScoredContentRow], cfg: &ScoringConfig, now: DateTime<Utc>) -> ScoreBreakdown {
    let counted: Vec<&ScoredContentRow> = rows.iter().filter(|r| !is_rejected(r)).collect();

    let content_score: f64 = counted
        .iter()
        .map(|r| {
            let engagement = (r.likes + r.comments + r.shares) as f64;
            (r.views as f64 * cfg.view_weight + engagement * cfg.engagement_weight)
                * cfg.multiplier(&r.platform)
        })
        .sum();

    let total_views: i64 = counted.iter().map(|r| r.views).sum();
    let total_engagement: i64 = counted.iter().map(|r| r.likes + r.comments + r.shares).sum();
    let engagement_rate = if total_views > 0 {
        total_engagement as f64 / total_views as f64 * 100.0
    } else {
        0.0
    };
    let engagement_score = (engagement_rate * cfg.engagement_rate_factor).min(cfg.engagement_cap);

    let half = Duration::days(cfg.window_days.max(0)) / 2;
    let recent_start = now - half;
    let previous_start = recent_start - half;
    let views_between = |from: DateTime<Utc>, to: DateTime<Utc>| -> i64 {
        counted
            .iter()
            .filter(|r| r.published_at >= from && r.published_at < to)
            .map(|r| r.views)
            .sum()
    };
    let recent = views_between(recent_start, now + Duration::seconds(1));
    let previous = views_between(previous_start, recent_start);
    let growth_score = if previous > 0 {
        ((recent - previous) as f64 / previous as f64 * 100.0).clamp(0.0, cfg.growth_cap)
    } else if recent > 0 {
        cfg.growth_cap
    } else {
        0.0
    };

    let approved = rows
        .iter()
        .filter(|r| r.validation_status == ValidationStatus::Approved.as_str())
        .count();
    let complete = rows.iter().filter(|r| is_complete(r)).count();
    let quality_score = cfg.approval_weight * percent(approved, rows.len())
        + cfg.completeness_weight * percent(complete, rows.len());

    let total = content_score + engagement_score + growth_score + quality_score;
    ScoreBreakdown {
        content_score,
        engagement_score,
        growth_score,
        quality_score,
        content_points: total.round() as i64,
    }
}

/// Recompute and persist a creator's points from the current window.
pub async fn recompute_creator_score(
    storage: &BoardStorage,
    cfg: &ScoringConfig,
    creator_id: CreatorId,
    now: DateTime<Utc>,
) -> Result<ScoreBreakdown, BoardError> {
    let since = now - Duration::days(cfg.window_days.max(0));
    let rows = storage.scoring_rows(creator_id, since).await?;
    let score = compute_score(&rows, cfg, now);
    storage.update_scores(creator_id, score.content_points).await?;
    debug!(creator_id, items = rows.len(), points = score.content_points, "creator score updated");
    Ok(score)
}
