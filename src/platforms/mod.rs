//! Clients for the three supported platforms.
//!
//! Each client speaks its platform's OAuth and content APIs and normalizes the
//! payloads into [`TokenGrant`], [`ChannelIdentity`] and [`PlatformVideo`].
//! [`PlatformClient`] dispatches by [`Platform`].

pub mod facebook;
pub mod http;
pub mod oauth;
pub mod twitch;
pub mod youtube;

use crate::config::Config;
use crate::db::models::{ContentType, MetricsSnapshot};
use crate::error::BoardError;
use chrono::{DateTime, Utc};
use oauth2::CsrfToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub use facebook::FacebookClient;
pub use twitch::TwitchClient;
pub use youtube::YoutubeClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Twitch,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Youtube, Platform::Twitch, Platform::Facebook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Twitch => "twitch",
            Platform::Facebook => "facebook",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Twitch => "Twitch",
            Platform::Facebook => "Facebook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Some(Platform::Youtube),
            "twitch" => Some(Platform::Twitch),
            "facebook" => Some(Platform::Facebook),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result of a code exchange or a refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// `None` when the platform did not issue or rotate one.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenGrant {
    pub(crate) fn expiring_in(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            // out-of-range lifetimes are treated as unknown
            expires_at: expires_in_secs
                .and_then(chrono::Duration::try_seconds)
                .and_then(|d| Utc::now().checked_add_signed(d)),
        }
    }
}

/// The platform account a token belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelIdentity {
    pub id: String,
    pub username: Option<String>,
    pub display_name: String,
}

/// One video/post/stream as reported by a platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformVideo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    pub published_at: DateTime<Utc>,
    pub content_type: ContentType,
    pub url: Option<String>,
    pub metrics: MetricsSnapshot,
}

/// A platform item addressed by id, as extracted from a submitted URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub platform: Platform,
    pub id: String,
    pub content_type: ContentType,
}

/// Dispatches platform operations to the matching client.
#[derive(Clone)]
pub struct PlatformClient {
    youtube: YoutubeClient,
    twitch: TwitchClient,
    facebook: FacebookClient,
}

impl PlatformClient {
    pub fn new(cfg: &Config, http: reqwest::Client) -> Self {
        Self {
            youtube: YoutubeClient::new(
                cfg.providers.youtube.clone(),
                cfg.redirect_uri(Platform::Youtube),
                http.clone(),
            ),
            twitch: TwitchClient::new(
                cfg.providers.twitch.clone(),
                cfg.redirect_uri(Platform::Twitch),
                http.clone(),
            ),
            facebook: FacebookClient::new(
                cfg.providers.facebook.clone(),
                cfg.redirect_uri(Platform::Facebook),
                http,
            ),
        }
    }

    /// Authorize URL plus the CSRF state embedded in it.
    pub fn auth_url(&self, platform: Platform) -> Result<(Url, CsrfToken), BoardError> {
        match platform {
            Platform::Youtube => self.youtube.auth_url(),
            Platform::Twitch => self.twitch.auth_url(),
            Platform::Facebook => self.facebook.auth_url(),
        }
    }

    pub async fn exchange_code(
        &self,
        platform: Platform,
        code: &str,
    ) -> Result<TokenGrant, BoardError> {
        match platform {
            Platform::Youtube => self.youtube.exchange_code(code).await,
            Platform::Twitch => self.twitch.exchange_code(code).await,
            Platform::Facebook => self.facebook.exchange_code(code).await,
        }
    }

    /// Exchange stored credentials for a fresh access token. Facebook issues no
    /// refresh tokens and re-exchanges the current access token instead.
    pub async fn refresh(
        &self,
        platform: Platform,
        refresh_token: Option<&str>,
        access_token: &str,
    ) -> Result<TokenGrant, BoardError> {
        let missing = || BoardError::Oauth2Server {
            error: "no refresh token stored".to_string(),
        };
        match platform {
            Platform::Youtube => self.youtube.refresh(refresh_token.ok_or_else(missing)?).await,
            Platform::Twitch => self.twitch.refresh(refresh_token.ok_or_else(missing)?).await,
            Platform::Facebook => self.facebook.refresh(access_token).await,
        }
    }

    pub async fn fetch_identity(
        &self,
        platform: Platform,
        token: &str,
    ) -> Result<ChannelIdentity, BoardError> {
        match platform {
            Platform::Youtube => self.youtube.fetch_identity(token).await,
            Platform::Twitch => self.twitch.fetch_identity(token).await,
            Platform::Facebook => self.facebook.fetch_identity(token).await,
        }
    }

    pub async fn list_recent(
        &self,
        platform: Platform,
        token: &str,
        account_id: &str,
        max_pages: usize,
    ) -> Result<Vec<PlatformVideo>, BoardError> {
        let max_pages = max_pages.max(1);
        match platform {
            Platform::Youtube => self.youtube.list_recent(token, account_id, max_pages).await,
            Platform::Twitch => self.twitch.list_recent(token, account_id, max_pages).await,
            Platform::Facebook => self.facebook.list_recent(token, account_id, max_pages).await,
        }
    }

    pub async fn fetch_video(
        &self,
        token: &str,
        video: &VideoRef,
    ) -> Result<PlatformVideo, BoardError> {
        match video.platform {
            Platform::Youtube => self.youtube.fetch_video(token, &video.id).await,
            Platform::Twitch => self.twitch.fetch_video(token, &video.id).await,
            Platform::Facebook => {
                self.facebook
                    .fetch_item(token, &video.id, video.content_type)
                    .await
            }
        }
    }
}

/// Parse the timestamp shapes the platforms emit (RFC 3339, or `+0000` offsets).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
