use crate::db::models::{
    Content, ContentId, ContentMetrics, ContentWithMetrics, CreatorId, MetricsSnapshot, NewContent,
    ScoredContentRow, ValidationStatus,
};
use crate::db::sqlite::BoardStorage;
use crate::error::BoardError;
use chrono::{DateTime, Utc};

const CONTENT_COLUMNS: &str = "id, creator_id, platform, platform_video_id, title, description, \
    thumbnail_url, duration_seconds, published_at, content_type, validation_status, original_url, \
    created_at, updated_at";

const METRICS_COLUMNS: &str = "id, content_id, views, likes, comments, shares, retrieved_at";

impl BoardStorage {
    pub async fn find_content_by_url(
        &self,
        creator_id: CreatorId,
        original_url: &str,
    ) -> Result<Option<Content>, BoardError> {
        let row = sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE creator_id = ? AND original_url = ?"
        ))
        .bind(creator_id)
        .bind(original_url)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn find_content_by_platform_id(
        &self,
        platform: &str,
        platform_video_id: &str,
    ) -> Result<Option<Content>, BoardError> {
        let row = sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE platform = ? AND platform_video_id = ?"
        ))
        .bind(platform)
        .bind(platform_video_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Upsert by unique (platform, platform_video_id).
    /// `validation_status` only applies to fresh rows and a stored `original_url`
    /// is never replaced, so a re-sync keeps the URL a creator submitted.
    pub async fn upsert_content(&self, item: &NewContent) -> Result<Content, BoardError> {
        let now = Utc::now();
        let rec: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO content (
                creator_id, platform, platform_video_id, title, description, thumbnail_url,
                duration_seconds, published_at, content_type, validation_status, original_url,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(platform, platform_video_id) DO UPDATE SET
                creator_id=excluded.creator_id,
                title=excluded.title,
                description=excluded.description,
                thumbnail_url=excluded.thumbnail_url,
                duration_seconds=excluded.duration_seconds,
                published_at=excluded.published_at,
                content_type=excluded.content_type,
                original_url=COALESCE(content.original_url, excluded.original_url),
                updated_at=excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(item.creator_id)
        .bind(&item.platform)
        .bind(&item.platform_video_id)
        .bind(&item.title)
        .bind(item.description.as_deref())
        .bind(item.thumbnail_url.as_deref())
        .bind(item.duration_seconds)
        .bind(item.published_at)
        .bind(item.content_type.as_str())
        .bind(item.validation_status.as_str())
        .bind(item.original_url.as_deref())
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;
        self.require_content(rec.0).await
    }

    /// Append a metrics snapshot. Snapshots are never updated in place.
    pub async fn insert_metrics(
        &self,
        content_id: ContentId,
        snapshot: MetricsSnapshot,
        retrieved_at: DateTime<Utc>,
    ) -> Result<ContentMetrics, BoardError> {
        let row = sqlx::query_as::<_, ContentMetrics>(&format!(
            "INSERT INTO content_metrics (content_id, views, likes, comments, shares, retrieved_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {METRICS_COLUMNS}"
        ))
        .bind(content_id)
        .bind(snapshot.views)
        .bind(snapshot.likes)
        .bind(snapshot.comments)
        .bind(snapshot.shares)
        .bind(retrieved_at)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_content(&self, id: ContentId) -> Result<Option<Content>, BoardError> {
        let row = sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn require_content(&self, id: ContentId) -> Result<Content, BoardError> {
        self.get_content(id)
            .await?
            .ok_or_else(|| BoardError::NotFound("Content not found".to_string()))
    }

    pub async fn metrics_history(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<ContentMetrics>, BoardError> {
        let rows = sqlx::query_as::<_, ContentMetrics>(&format!(
            "SELECT {METRICS_COLUMNS} FROM content_metrics WHERE content_id = ? \
             ORDER BY retrieved_at DESC, id DESC"
        ))
        .bind(content_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn latest_metrics(
        &self,
        content_id: ContentId,
    ) -> Result<Option<ContentMetrics>, BoardError> {
        let row = sqlx::query_as::<_, ContentMetrics>(&format!(
            "SELECT {METRICS_COLUMNS} FROM content_metrics WHERE content_id = ? \
             ORDER BY retrieved_at DESC, id DESC LIMIT 1"
        ))
        .bind(content_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn list_content_for_creator(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<ContentWithMetrics>, BoardError> {
        let items = sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE creator_id = ? \
             ORDER BY published_at DESC, id DESC"
        ))
        .bind(creator_id)
        .fetch_all(self.pool())
        .await?;

        let mut out = Vec::with_capacity(items.len());
        for content in items {
            let latest_metrics = self.latest_metrics(content.id).await?;
            out.push(ContentWithMetrics {
                content,
                latest_metrics,
            });
        }
        Ok(out)
    }

    pub async fn set_validation_status(
        &self,
        id: ContentId,
        status: ValidationStatus,
    ) -> Result<Content, BoardError> {
        let result =
            sqlx::query("UPDATE content SET validation_status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool())
                .await?;
        if result.rows_affected() == 0 {
            return Err(BoardError::NotFound("Content not found".to_string()));
        }
        self.require_content(id).await
    }

    /// Remove a content row together with its metrics in one transaction.
    /// Returns false when the row did not exist.
    pub async fn delete_content(&self, id: ContentId) -> Result<bool, BoardError> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM content_metrics WHERE content_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM content WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// Latest snapshot retrieved since `since` for every content item of a creator.
    pub async fn scoring_rows(
        &self,
        creator_id: CreatorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ScoredContentRow>, BoardError> {
        let rows = sqlx::query_as::<_, ScoredContentRow>(
            r#"
            SELECT c.platform, c.title, c.description, c.thumbnail_url, c.validation_status,
                   c.published_at, m.views, m.likes, m.comments, m.shares
            FROM content c
            JOIN content_metrics m ON m.id = (
                SELECT m2.id FROM content_metrics m2
                WHERE m2.content_id = c.id AND m2.retrieved_at >= ?
                ORDER BY m2.retrieved_at DESC, m2.id DESC
                LIMIT 1
            )
            WHERE c.creator_id = ?
            "#,
        )
        .bind(since)
        .bind(creator_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
