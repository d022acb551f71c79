//! Periodic pull of recent content and metrics from every active connection.

use crate::config::{ScoringConfig, SyncConfig};
use crate::db::models::{DbConnection, NewContent, ValidationStatus};
use crate::db::BoardStorage;
use crate::error::BoardError;
use crate::platforms::{Platform, PlatformClient};
use crate::service::scoring::recompute_creator_score;
use crate::service::submission::clean_url;
use crate::service::token_refresh::TokenRefreshService;
use chrono::Utc;
use futures::future::join_all;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Content items upserted across all connections.
    pub items: usize,
}

#[derive(Clone)]
pub struct SyncService {
    storage: BoardStorage,
    platforms: PlatformClient,
    tokens: TokenRefreshService,
    cfg: SyncConfig,
    scoring: ScoringConfig,
}

impl SyncService {
    pub fn new(
        storage: BoardStorage,
        platforms: PlatformClient,
        tokens: TokenRefreshService,
        cfg: SyncConfig,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            storage,
            platforms,
            tokens,
            cfg,
            scoring,
        }
    }

    /// Sync all active connections in batches. A failing connection is
    /// counted and logged without affecting the rest of its batch.
    pub async fn run_once(&self) -> Result<SyncReport, BoardError> {
        let connections = self.storage.list_active_connections().await?;
        let mut report = SyncReport {
            total: connections.len(),
            ..SyncReport::default()
        };
        info!(connections = report.total, "sync pass started");

        let batch_size = self.cfg.batch_size.max(1);
        for (i, batch) in connections.chunks(batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.cfg.batch_delay_ms)).await;
            }
            let results = join_all(batch.iter().map(|conn| self.sync_connection(conn))).await;
            for (conn, result) in batch.iter().zip(results) {
                match result {
                    Ok(items) => {
                        report.succeeded += 1;
                        report.items += items;
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(connection_id = conn.id, platform = %conn.platform, error = %e, "connection sync failed");
                    }
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            items = report.items,
            "sync pass finished"
        );
        Ok(report)
    }

    /// Pull recent items of one connection, store them with a fresh metrics
    /// snapshot and rescore the owner. Returns the number of items stored.
    pub async fn sync_connection(&self, conn: &DbConnection) -> Result<usize, BoardError> {
        let platform = Platform::parse(&conn.platform)
            .ok_or_else(|| BoardError::Internal(format!("unknown platform {}", conn.platform)))?;

        let max_pages = self.cfg.max_pages;
        let fetched = self
            .tokens
            .handle_api_call_with_token_refresh(
                conn.id,
                |token| {
                    let platforms = &self.platforms;
                    let account = conn.platform_user_id.as_str();
                    async move {
                        platforms
                            .list_recent(platform, &token, account, max_pages)
                            .await
                    }
                },
                1,
            )
            .await;
        let videos = match fetched {
            Ok(videos) => videos,
            Err(BoardError::TokenRevoked(reason)) => {
                self.storage.set_connection_active(conn.id, false).await?;
                warn!(connection_id = conn.id, %platform, reason = %reason, "connection deactivated");
                return Err(BoardError::TokenRevoked(reason));
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        for video in &videos {
            let content = self
                .storage
                .upsert_content(&NewContent {
                    creator_id: conn.creator_id,
                    platform: platform.as_str().to_string(),
                    platform_video_id: video.id.clone(),
                    title: video.title.clone(),
                    description: video.description.clone(),
                    thumbnail_url: video.thumbnail_url.as_deref().map(clean_url),
                    duration_seconds: video.duration_seconds,
                    published_at: video.published_at,
                    content_type: video.content_type,
                    validation_status: ValidationStatus::Approved,
                    original_url: video.url.clone(),
                })
                .await?;
            self.storage
                .insert_metrics(content.id, video.metrics, now)
                .await?;
        }

        self.storage.mark_synced(conn.id, now).await?;
        recompute_creator_score(&self.storage, &self.scoring, conn.creator_id, now).await?;
        info!(connection_id = conn.id, %platform, items = videos.len(), "connection synced");
        Ok(videos.len())
    }

    /// Run a pass every `interval_secs` until `shutdown` flips to true.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.cfg.interval_secs.max(60));
            let start = if self.cfg.run_on_startup {
                tokio::time::Instant::now()
            } else {
                tokio::time::Instant::now() + period
            };
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut ticks = IntervalStream::new(interval);
            info!(interval_secs = period.as_secs(), "sync scheduler started");

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    Some(_) = ticks.next() => {
                        if let Err(e) = self.run_once().await {
                            error!(error = %e, "sync pass aborted");
                        }
                    }
                }
            }
            info!("sync scheduler stopped");
        })
    }
}
