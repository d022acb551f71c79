//! SQL DDL for initializing the board storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `creators` owned by the board, never deleted in normal flow
/// - `platform_connections` UNIQUE(creator_id, platform), tokens stored encrypted
/// - `content` UNIQUE(platform, platform_video_id)
/// - `content_metrics` append-only snapshots keyed by content
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS creators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    region TEXT NULL,
    tier TEXT NOT NULL DEFAULT 'BRONZE',
    total_points INTEGER NOT NULL DEFAULT 0,
    content_points INTEGER NOT NULL DEFAULT 0,
    referral_points INTEGER NOT NULL DEFAULT 0,
    referral_link TEXT NULL,
    uid_hex TEXT NOT NULL UNIQUE,
    referral_count INTEGER NOT NULL DEFAULT 0,
    is_super_admin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS platform_connections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    creator_id INTEGER NOT NULL REFERENCES creators(id),
    platform TEXT NOT NULL,
    platform_user_id TEXT NOT NULL,
    platform_username TEXT NULL,
    access_token TEXT NOT NULL, -- encrypted
    refresh_token TEXT NULL, -- encrypted
    token_expiry TEXT NULL, -- RFC3339
    last_sync TEXT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (creator_id, platform)
);

CREATE INDEX IF NOT EXISTS idx_connections_platform_user
    ON platform_connections(platform, platform_user_id);

CREATE TABLE IF NOT EXISTS content (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    creator_id INTEGER NOT NULL REFERENCES creators(id),
    platform TEXT NOT NULL,
    platform_video_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NULL,
    thumbnail_url TEXT NULL,
    duration_seconds INTEGER NOT NULL DEFAULT 0,
    published_at TEXT NOT NULL,
    content_type TEXT NOT NULL DEFAULT 'video',
    validation_status TEXT NOT NULL DEFAULT 'PENDING',
    original_url TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (platform, platform_video_id)
);

CREATE INDEX IF NOT EXISTS idx_content_creator_url ON content(creator_id, original_url);

CREATE TABLE IF NOT EXISTS content_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id INTEGER NOT NULL REFERENCES content(id),
    views INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0,
    comments INTEGER NOT NULL DEFAULT 0,
    shares INTEGER NOT NULL DEFAULT 0,
    retrieved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metrics_content_time ON content_metrics(content_id, retrieved_at);
"#;
