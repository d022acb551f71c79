use crate::db::models::{Creator, CreatorId, CreatorUpdate, LeaderboardEntry};
use crate::db::sqlite::BoardStorage;
use crate::error::BoardError;
use chrono::Utc;
use rand::RngCore;

const CREATOR_COLUMNS: &str = "id, name, region, tier, total_points, content_points, \
    referral_points, referral_link, uid_hex, referral_count, is_super_admin, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct LeaderboardFilter {
    pub region: Option<String>,
    pub tier: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

fn random_uid_hex() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl BoardStorage {
    /// Insert a creator with a fresh referral id. `frontend_url` seeds the referral link.
    pub async fn create_creator(
        &self,
        name: &str,
        frontend_url: &str,
    ) -> Result<Creator, BoardError> {
        let uid_hex = random_uid_hex();
        let referral_link = format!("{}/?ref={}", frontend_url.trim_end_matches('/'), uid_hex);
        let now = Utc::now();
        let rec: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO creators (name, uid_hex, referral_link, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(&uid_hex)
        .bind(referral_link)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;
        self.require_creator(rec.0).await
    }

    pub async fn get_creator(&self, id: CreatorId) -> Result<Option<Creator>, BoardError> {
        let creator = sqlx::query_as::<_, Creator>(&format!(
            "SELECT {CREATOR_COLUMNS} FROM creators WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(creator)
    }

    pub async fn require_creator(&self, id: CreatorId) -> Result<Creator, BoardError> {
        self.get_creator(id)
            .await?
            .ok_or_else(|| BoardError::NotFound("Creator not found".to_string()))
    }

    /// Case-insensitive match on name or exact match on uid_hex.
    pub async fn search_creators(&self, q: &str, limit: i64) -> Result<Vec<Creator>, BoardError> {
        let pattern = format!("%{}%", q.trim().to_lowercase());
        let rows = sqlx::query_as::<_, Creator>(&format!(
            "SELECT {CREATOR_COLUMNS} FROM creators \
             WHERE lower(name) LIKE ? OR uid_hex = ? \
             ORDER BY total_points DESC, id LIMIT ?"
        ))
        .bind(pattern)
        .bind(q.trim())
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn update_creator(
        &self,
        id: CreatorId,
        update: &CreatorUpdate,
    ) -> Result<Creator, BoardError> {
        let result = sqlx::query(
            r#"
            UPDATE creators SET
                name = COALESCE(?, name),
                region = COALESCE(?, region),
                tier = COALESCE(?, tier),
                total_points = COALESCE(?, total_points),
                content_points = COALESCE(?, content_points),
                referral_points = COALESCE(?, referral_points),
                referral_count = COALESCE(?, referral_count),
                is_super_admin = COALESCE(?, is_super_admin),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.region.as_deref())
        .bind(update.tier.as_deref())
        .bind(update.total_points)
        .bind(update.content_points)
        .bind(update.referral_points)
        .bind(update.referral_count)
        .bind(update.is_super_admin)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(BoardError::NotFound("Creator not found".to_string()));
        }
        self.require_creator(id).await
    }

    /// Store recomputed content points; total is content plus referral points.
    pub async fn update_scores(
        &self,
        id: CreatorId,
        content_points: i64,
    ) -> Result<(), BoardError> {
        sqlx::query(
            r#"
            UPDATE creators SET
                content_points = ?,
                total_points = ? + referral_points,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(content_points)
        .bind(content_points)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn leaderboard(
        &self,
        filter: &LeaderboardFilter,
    ) -> Result<Vec<LeaderboardEntry>, BoardError> {
        let rows = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                ROW_NUMBER() OVER (ORDER BY total_points DESC, id ASC) AS rank,
                id, name, region, tier, total_points, content_points, referral_points
            FROM creators
            WHERE (? IS NULL OR region = ?)
              AND (? IS NULL OR tier = ?)
            ORDER BY total_points DESC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(filter.region.as_deref())
        .bind(filter.region.as_deref())
        .bind(filter.tier.as_deref())
        .bind(filter.tier.as_deref())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
