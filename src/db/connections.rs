use crate::db::models::{ConnectionId, CreatorId, DbConnection, NewConnection};
use crate::db::sqlite::BoardStorage;
use crate::error::BoardError;
use chrono::{DateTime, Utc};

const CONNECTION_COLUMNS: &str = "id, creator_id, platform, platform_user_id, platform_username, \
    access_token, refresh_token, token_expiry, last_sync, is_active, created_at, updated_at";

impl BoardStorage {
    /// Upsert by unique (creator_id, platform). Re-activates the row and keeps the
    /// previous refresh token when the platform did not issue a new one.
    pub async fn upsert_connection(&self, conn: NewConnection) -> Result<ConnectionId, BoardError> {
        let access = self.cipher().encrypt(&conn.access_token)?;
        let refresh = self.cipher().encrypt_opt(conn.refresh_token.as_deref())?;
        let now = Utc::now();

        let rec: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO platform_connections (
                creator_id, platform, platform_user_id, platform_username,
                access_token, refresh_token, token_expiry, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            ON CONFLICT(creator_id, platform) DO UPDATE SET
                platform_user_id=excluded.platform_user_id,
                platform_username=excluded.platform_username,
                access_token=excluded.access_token,
                refresh_token=COALESCE(excluded.refresh_token, platform_connections.refresh_token),
                token_expiry=excluded.token_expiry,
                is_active=1,
                updated_at=excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(conn.creator_id)
        .bind(&conn.platform)
        .bind(&conn.platform_user_id)
        .bind(conn.platform_username)
        .bind(access)
        .bind(refresh)
        .bind(conn.token_expiry)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;
        Ok(rec.0)
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Result<Option<DbConnection>, BoardError> {
        let row = sqlx::query_as::<_, DbConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM platform_connections WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn find_connection(
        &self,
        creator_id: CreatorId,
        platform: &str,
    ) -> Result<Option<DbConnection>, BoardError> {
        let row = sqlx::query_as::<_, DbConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM platform_connections \
             WHERE creator_id = ? AND platform = ?"
        ))
        .bind(creator_id)
        .bind(platform)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Existing link of a platform account, used to log a returning creator in.
    pub async fn find_connection_by_platform_user(
        &self,
        platform: &str,
        platform_user_id: &str,
    ) -> Result<Option<DbConnection>, BoardError> {
        let row = sqlx::query_as::<_, DbConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM platform_connections \
             WHERE platform = ? AND platform_user_id = ? ORDER BY id LIMIT 1"
        ))
        .bind(platform)
        .bind(platform_user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn list_active_connections(&self) -> Result<Vec<DbConnection>, BoardError> {
        let rows = sqlx::query_as::<_, DbConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM platform_connections WHERE is_active = 1 ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn list_connections(&self) -> Result<Vec<DbConnection>, BoardError> {
        let rows = sqlx::query_as::<_, DbConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM platform_connections ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn list_connections_for_creator(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<DbConnection>, BoardError> {
        let rows = sqlx::query_as::<_, DbConnection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM platform_connections WHERE creator_id = ? ORDER BY id"
        ))
        .bind(creator_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Persist a refreshed token set in a single statement.
    pub async fn update_tokens(
        &self,
        id: ConnectionId,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expiry: Option<DateTime<Utc>>,
    ) -> Result<(), BoardError> {
        let access = self.cipher().encrypt(access_token)?;
        let refresh = self.cipher().encrypt_opt(refresh_token)?;
        sqlx::query(
            r#"
            UPDATE platform_connections SET
                access_token = ?,
                refresh_token = COALESCE(?, refresh_token),
                token_expiry = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access)
        .bind(refresh)
        .bind(token_expiry)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn set_connection_active(
        &self,
        id: ConnectionId,
        active: bool,
    ) -> Result<(), BoardError> {
        sqlx::query("UPDATE platform_connections SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn mark_synced(&self, id: ConnectionId, at: DateTime<Utc>) -> Result<(), BoardError> {
        sqlx::query("UPDATE platform_connections SET last_sync = ?, updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(at)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub fn decrypt_access_token(&self, conn: &DbConnection) -> Result<String, BoardError> {
        self.cipher().decrypt(&conn.access_token)
    }

    pub fn decrypt_refresh_token(&self, conn: &DbConnection) -> Result<Option<String>, BoardError> {
        conn.refresh_token
            .as_deref()
            .map(|t| self.cipher().decrypt(t))
            .transpose()
    }
}
