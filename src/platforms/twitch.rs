//! Twitch Helix client.
//!
//! Twitch's token endpoint returns `scope` as a JSON array, which the generic
//! OAuth2 token response cannot decode, so code and refresh exchanges are
//! posted directly and decoded into [`TwitchTokenResponse`].

use super::http::{check_status, endpoint, get_json};
use super::oauth::{self, build_oauth2_client};
use super::{ChannelIdentity, PlatformVideo, TokenGrant, parse_timestamp};
use crate::config::ProviderConfig;
use crate::db::models::{ContentType, MetricsSnapshot};
use crate::error::BoardError;
use chrono::Utc;
use oauth2::CsrfToken;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::LazyLock;
use url::Url;

const PAGE_SIZE: usize = 20;

static TWITCH_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("valid regex")
});

/// Seconds in a Twitch duration such as `1h2m3s`. Malformed input yields 0.
pub fn parse_duration(raw: &str) -> i64 {
    let Some(caps) = TWITCH_DURATION.captures(raw.trim()) else {
        return 0;
    };
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0)
    };
    part(1) * 3_600 + part(2) * 60 + part(3)
}

#[derive(Clone)]
pub struct TwitchClient {
    provider: ProviderConfig,
    redirect_uri: String,
    http: reqwest::Client,
}

impl TwitchClient {
    pub fn new(provider: ProviderConfig, redirect_uri: String, http: reqwest::Client) -> Self {
        Self {
            provider,
            redirect_uri,
            http,
        }
    }

    fn api(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, BoardError> {
        endpoint(&self.provider.api_base, path, query)
    }

    fn client_id_header(&self) -> [(&'static str, &str); 1] {
        [("Client-Id", self.provider.client_id.as_str())]
    }

    pub fn auth_url(&self) -> Result<(Url, CsrfToken), BoardError> {
        let client = build_oauth2_client(&self.provider, &self.redirect_uri)?;
        Ok(oauth::authorize_url(&client, &self.provider, &[("force_verify", "true")]))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, BoardError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, BoardError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, BoardError> {
        let mut form = vec![
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let resp = self
            .http
            .post(&self.provider.token_url)
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let err: TwitchErrorResponse = resp.json().await.unwrap_or_default();
            return Err(BoardError::Oauth2Server {
                error: err.message.unwrap_or_else(|| status.to_string()),
            });
        }
        let token: TwitchTokenResponse = check_status(resp).await?.json().await?;
        Ok(TokenGrant::expiring_in(
            token.access_token,
            token.refresh_token,
            token.expires_in,
        ))
    }

    pub async fn fetch_identity(&self, token: &str) -> Result<ChannelIdentity, BoardError> {
        let url = self.api("users", &[])?;
        let resp: DataResponse<User> =
            get_json(&self.http, url.as_str(), token, &self.client_id_header()).await?;
        let user = resp
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BoardError::UpstreamPayload("no Twitch user for token".into()))?;
        Ok(ChannelIdentity {
            id: user.id,
            username: Some(user.login),
            display_name: user.display_name,
        })
    }

    pub async fn list_recent(
        &self,
        token: &str,
        user_id: &str,
        max_pages: usize,
    ) -> Result<Vec<PlatformVideo>, BoardError> {
        let mut videos = Vec::new();
        let page_size = PAGE_SIZE.to_string();
        let mut cursor: Option<String> = None;
        for _ in 0..max_pages {
            let mut query = vec![("user_id", user_id), ("first", page_size.as_str())];
            if let Some(after) = cursor.as_deref() {
                query.push(("after", after));
            }
            let url = self.api("videos", &query)?;
            let page: DataResponse<Video> =
                get_json(&self.http, url.as_str(), token, &self.client_id_header()).await?;
            videos.extend(page.data.into_iter().map(Video::into_platform));
            match page.pagination.and_then(|p| p.cursor) {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(videos)
    }

    pub async fn fetch_video(&self, token: &str, video_id: &str) -> Result<PlatformVideo, BoardError> {
        let url = self.api("videos", &[("id", video_id)])?;
        let resp: DataResponse<Video> =
            get_json(&self.http, url.as_str(), token, &self.client_id_header()).await?;
        resp.data
            .into_iter()
            .next()
            .map(Video::into_platform)
            .ok_or_else(|| BoardError::UpstreamPayload(format!("Twitch video {video_id} not found")))
    }
}

#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct TwitchErrorResponse {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    login: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
    url: Option<String>,
    thumbnail_url: Option<String>,
    #[serde(default)]
    view_count: i64,
    published_at: Option<String>,
    created_at: Option<String>,
    duration: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl Video {
    fn into_platform(self) -> PlatformVideo {
        let content_type = match self.kind.as_deref() {
            Some("archive") => ContentType::Stream,
            _ => ContentType::Video,
        };
        PlatformVideo {
            id: self.id,
            title: self.title,
            description: self.description.filter(|d| !d.is_empty()),
            // Twitch uses an empty string for videos still being processed
            thumbnail_url: self.thumbnail_url.filter(|t| !t.is_empty()),
            duration_seconds: self.duration.as_deref().map(parse_duration).unwrap_or(0),
            published_at: self
                .published_at
                .or(self.created_at)
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            content_type,
            url: self.url,
            metrics: MetricsSnapshot {
                views: self.view_count,
                ..MetricsSnapshot::default()
            },
        }
    }
}
