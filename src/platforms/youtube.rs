//! YouTube Data API v3 client. OAuth goes through Google's endpoints.

use super::http::{endpoint, get_json};
use super::oauth::{self, PlatformOauth2Client, build_oauth2_client};
use super::{ChannelIdentity, PlatformVideo, TokenGrant, parse_timestamp};
use crate::config::ProviderConfig;
use crate::db::models::{ContentType, MetricsSnapshot};
use crate::error::BoardError;
use chrono::Utc;
use oauth2::CsrfToken;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use url::Url;

const PAGE_SIZE: usize = 50;

static ISO8601_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("valid regex")
});

/// Seconds in an ISO-8601 duration such as `PT1H2M3S`. Malformed input yields 0.
pub fn parse_duration(raw: &str) -> i64 {
    let Some(caps) = ISO8601_DURATION.captures(raw.trim()) else {
        return 0;
    };
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0)
    };
    part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4)
}

#[derive(Clone)]
pub struct YoutubeClient {
    provider: ProviderConfig,
    redirect_uri: String,
    http: reqwest::Client,
}

impl YoutubeClient {
    pub fn new(provider: ProviderConfig, redirect_uri: String, http: reqwest::Client) -> Self {
        Self {
            provider,
            redirect_uri,
            http,
        }
    }

    fn oauth_client(&self) -> Result<PlatformOauth2Client, BoardError> {
        build_oauth2_client(&self.provider, &self.redirect_uri)
    }

    fn api(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, BoardError> {
        endpoint(&self.provider.api_base, path, query)
    }

    pub fn auth_url(&self) -> Result<(Url, CsrfToken), BoardError> {
        let client = self.oauth_client()?;
        Ok(oauth::authorize_url(
            &client,
            &self.provider,
            &[("access_type", "offline"), ("prompt", "consent")],
        ))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, BoardError> {
        oauth::exchange_code(&self.oauth_client()?, code, &self.http).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, BoardError> {
        oauth::exchange_refresh_token(&self.oauth_client()?, refresh_token, &self.http).await
    }

    pub async fn fetch_identity(&self, token: &str) -> Result<ChannelIdentity, BoardError> {
        let url = self.api("channels", &[("part", "snippet"), ("mine", "true")])?;
        let resp: ListResponse<Channel> = get_json(&self.http, url.as_str(), token, &[]).await?;
        let channel = resp
            .items
            .into_iter()
            .next()
            .ok_or_else(|| BoardError::UpstreamPayload("no YouTube channel for account".into()))?;
        let snippet = channel.snippet.unwrap_or_default();
        Ok(ChannelIdentity {
            id: channel.id,
            username: snippet.custom_url,
            display_name: snippet.title,
        })
    }

    /// Recent uploads of `channel_id`, newest first.
    pub async fn list_recent(
        &self,
        token: &str,
        channel_id: &str,
        max_pages: usize,
    ) -> Result<Vec<PlatformVideo>, BoardError> {
        let url = self.api("channels", &[("part", "contentDetails"), ("id", channel_id)])?;
        let resp: ListResponse<Channel> = get_json(&self.http, url.as_str(), token, &[]).await?;
        let Some(uploads) = resp
            .items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .map(|d| d.related_playlists.uploads)
        else {
            return Ok(Vec::new());
        };

        let mut video_ids = Vec::new();
        let page_size = PAGE_SIZE.to_string();
        let mut page_token: Option<String> = None;
        for _ in 0..max_pages {
            let mut query = vec![
                ("part", "contentDetails"),
                ("maxResults", page_size.as_str()),
                ("playlistId", uploads.as_str()),
            ];
            if let Some(t) = page_token.as_deref() {
                query.push(("pageToken", t));
            }
            let url = self.api("playlistItems", &query)?;
            let page: ListResponse<PlaylistItem> =
                get_json(&self.http, url.as_str(), token, &[]).await?;
            video_ids.extend(page.items.into_iter().map(|i| i.content_details.video_id));
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        let mut videos = Vec::with_capacity(video_ids.len());
        for chunk in video_ids.chunks(PAGE_SIZE) {
            videos.extend(self.fetch_videos(token, chunk).await?);
        }
        Ok(videos)
    }

    pub async fn fetch_video(&self, token: &str, video_id: &str) -> Result<PlatformVideo, BoardError> {
        self.fetch_videos(token, &[video_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BoardError::UpstreamPayload(format!("YouTube video {video_id} not found")))
    }

    async fn fetch_videos(
        &self,
        token: &str,
        ids: &[String],
    ) -> Result<Vec<PlatformVideo>, BoardError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.join(",");
        let url = self.api(
            "videos",
            &[("part", "snippet,contentDetails,statistics"), ("id", ids.as_str())],
        )?;
        let resp: ListResponse<Video> = get_json(&self.http, url.as_str(), token, &[]).await?;
        Ok(resp.items.into_iter().map(Video::into_platform).collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Channel {
    id: String,
    snippet: Option<ChannelSnippet>,
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
    custom_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Video {
    id: String,
    #[serde(default)]
    snippet: VideoSnippet,
    content_details: Option<VideoContentDetails>,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    description: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
    live_broadcast_content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.maxres
            .or(self.high)
            .or(self.medium)
            .or(self.default)
            .map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

fn count(raw: &Option<String>) -> i64 {
    raw.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0)
}

impl Video {
    fn into_platform(self) -> PlatformVideo {
        let content_type = match self.snippet.live_broadcast_content.as_deref() {
            Some("live") | Some("upcoming") => ContentType::Stream,
            _ => ContentType::Video,
        };
        PlatformVideo {
            url: Some(format!("https://www.youtube.com/watch?v={}", self.id)),
            id: self.id,
            title: self.snippet.title,
            description: self.snippet.description.filter(|d| !d.is_empty()),
            thumbnail_url: self.snippet.thumbnails.best(),
            duration_seconds: self
                .content_details
                .and_then(|d| d.duration)
                .map(|d| parse_duration(&d))
                .unwrap_or(0),
            published_at: self
                .snippet
                .published_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            content_type,
            metrics: MetricsSnapshot {
                views: count(&self.statistics.view_count),
                likes: count(&self.statistics.like_count),
                comments: count(&self.statistics.comment_count),
                shares: 0,
            },
        }
    }
}
