use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type CreatorId = i64;
pub type ConnectionId = i64;
pub type ContentId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: CreatorId,
    pub name: String,
    pub region: Option<String>,
    pub tier: String,
    pub total_points: i64,
    pub content_points: i64,
    pub referral_points: i64,
    pub referral_link: Option<String>,
    #[serde(rename = "uidHEX")]
    pub uid_hex: String,
    pub referral_count: i64,
    pub is_super_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an admin may change on a creator. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorUpdate {
    pub name: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
    pub total_points: Option<i64>,
    pub content_points: Option<i64>,
    pub referral_points: Option<i64>,
    pub referral_count: Option<i64>,
    pub is_super_admin: Option<bool>,
}

/// Stored row; token columns hold ciphertext.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbConnection {
    pub id: ConnectionId,
    pub creator_id: CreatorId,
    pub platform: String,
    pub platform_user_id: String,
    pub platform_username: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub last_sync: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Secret-free view of a connection for API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: ConnectionId,
    pub creator_id: CreatorId,
    pub platform: String,
    pub platform_user_id: String,
    pub platform_username: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub last_sync: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<&DbConnection> for ConnectionSummary {
    fn from(c: &DbConnection) -> Self {
        Self {
            id: c.id,
            creator_id: c.creator_id,
            platform: c.platform.clone(),
            platform_user_id: c.platform_user_id.clone(),
            platform_username: c.platform_username.clone(),
            token_expiry: c.token_expiry,
            last_sync: c.last_sync,
            is_active: c.is_active,
        }
    }
}

/// Plaintext credential material, encrypted by the storage layer on write.
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub creator_id: CreatorId,
    pub platform: String,
    pub platform_user_id: String,
    pub platform_username: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: ContentId,
    pub creator_id: CreatorId,
    pub platform: String,
    pub platform_video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    pub published_at: DateTime<Utc>,
    pub content_type: String,
    pub validation_status: String,
    pub original_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContent {
    pub creator_id: CreatorId,
    pub platform: String,
    pub platform_video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    pub published_at: DateTime<Utc>,
    pub content_type: ContentType,
    /// Applied on insert only; re-syncs keep an admin's decision.
    pub validation_status: ValidationStatus,
    pub original_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetrics {
    pub id: i64,
    pub content_id: ContentId,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

impl MetricsSnapshot {
    pub fn engagement(&self) -> i64 {
        self.likes + self.comments + self.shares
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentWithMetrics {
    #[serde(flatten)]
    pub content: Content,
    pub latest_metrics: Option<ContentMetrics>,
}

/// Latest in-window metrics per content item, input to scoring.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ScoredContentRow {
    pub platform: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub validation_status: String,
    pub published_at: DateTime<Utc>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub id: CreatorId,
    pub name: String,
    pub region: Option<String>,
    pub tier: String,
    pub total_points: i64,
    pub content_points: i64,
    pub referral_points: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Post,
    Stream,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Post => "post",
            Self::Stream => "stream",
        }
    }
}
