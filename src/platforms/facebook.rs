//! Facebook Graph API client.
//!
//! Facebook issues long-lived user tokens instead of refresh tokens. Both the
//! code exchange and "refresh" end in an `fb_exchange_token` grant.

use super::http::{check_status, endpoint, get_json};
use super::oauth::{self, build_oauth2_client};
use super::{ChannelIdentity, PlatformVideo, TokenGrant, parse_timestamp};
use crate::config::ProviderConfig;
use crate::db::models::{ContentType, MetricsSnapshot};
use crate::error::BoardError;
use chrono::Utc;
use oauth2::CsrfToken;
use serde::Deserialize;
use url::Url;

const POST_FIELDS: &str = "id,message,created_time,full_picture,permalink_url,\
attachments{media_type,type,title,description,media},\
likes.summary(true).limit(0),comments.summary(true).limit(0),shares";

const VIDEO_FIELDS: &str = "id,title,description,picture,length,created_time,permalink_url,\
likes.summary(true).limit(0),comments.summary(true).limit(0)";

#[derive(Clone)]
pub struct FacebookClient {
    provider: ProviderConfig,
    redirect_uri: String,
    http: reqwest::Client,
}

impl FacebookClient {
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

    pub fn auth_url(&self) -> Result<(Url, CsrfToken), BoardError> {
        let client = build_oauth2_client(&self.provider, &self.redirect_uri)?;
        Ok(oauth::authorize_url(&client, &self.provider, &[]))
    }

    /// Short-lived code exchange followed by the long-lived upgrade.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, BoardError> {
        let short = self
            .token_request(&[
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .await?;
        self.refresh(&short.access_token).await
    }

    pub async fn refresh(&self, access_token: &str) -> Result<TokenGrant, BoardError> {
        self.token_request(&[
            ("grant_type", "fb_exchange_token"),
            ("fb_exchange_token", access_token),
        ])
        .await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, BoardError> {
        let mut query = vec![
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
        ];
        query.extend_from_slice(params);

        let resp = self
            .http
            .get(&self.provider.token_url)
            .query(&query)
            .send()
            .await?;
        if resp.status().is_client_error() {
            let err: GraphErrorResponse = resp.json().await.unwrap_or_default();
            return Err(BoardError::Oauth2Server {
                error: err
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "token exchange rejected".to_string()),
            });
        }
        let token: FacebookTokenResponse = check_status(resp).await?.json().await?;
        Ok(TokenGrant::expiring_in(token.access_token, None, token.expires_in))
    }

    pub async fn fetch_identity(&self, token: &str) -> Result<ChannelIdentity, BoardError> {
        let url = self.api("me", &[("fields", "id,name")])?;
        let me: Me = get_json(&self.http, url.as_str(), token, &[]).await?;
        Ok(ChannelIdentity {
            id: me.id,
            username: None,
            display_name: me.name.unwrap_or_default(),
        })
    }

    pub async fn list_recent(
        &self,
        token: &str,
        user_id: &str,
        max_pages: usize,
    ) -> Result<Vec<PlatformVideo>, BoardError> {
        let mut items = Vec::new();
        // `paging.next` comes back fully encoded and is followed as-is
        let mut url = self
            .api(&format!("{user_id}/posts"), &[("limit", "25"), ("fields", POST_FIELDS)])?
            .to_string();
        for _ in 0..max_pages {
            let page: PostPage = get_json(&self.http, &url, token, &[]).await?;
            items.extend(page.data.into_iter().map(Post::into_platform));
            match page.paging.and_then(|p| p.next) {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }
        Ok(items)
    }

    /// Fetch one post or video; the two live behind different field sets.
    pub async fn fetch_item(
        &self,
        token: &str,
        id: &str,
        kind: ContentType,
    ) -> Result<PlatformVideo, BoardError> {
        match kind {
            ContentType::Post => {
                let url = self.api(id, &[("fields", POST_FIELDS)])?;
                let post: Post = get_json(&self.http, url.as_str(), token, &[]).await?;
                Ok(post.into_platform())
            }
            ContentType::Video | ContentType::Stream => {
                let url = self.api(id, &[("fields", VIDEO_FIELDS)])?;
                let video: GraphVideo = get_json(&self.http, url.as_str(), token, &[]).await?;
                Ok(video.into_platform())
            }
        }
    }
}

/// Classify a post by its first attachment.
pub fn content_type_of(attachments: Option<&Attachments>) -> ContentType {
    let is_video = attachments
        .and_then(|a| a.data.first())
        .map(|a| {
            let media = a.media_type.as_deref().unwrap_or_default();
            let kind = a.kind.as_deref().unwrap_or_default();
            media.eq_ignore_ascii_case("video") || kind.to_ascii_lowercase().contains("video")
        })
        .unwrap_or(false);
    if is_video {
        ContentType::Video
    } else {
        ContentType::Post
    }
}

#[derive(Debug, Deserialize)]
struct FacebookTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphErrorResponse {
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Me {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostPage {
    #[serde(default)]
    data: Vec<Post>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    total_count: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Edge {
    #[serde(default)]
    summary: Summary,
}

#[derive(Debug, Default, Deserialize)]
struct Shares {
    #[serde(default)]
    count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub data: Vec<Attachment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Attachment {
    pub media_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub media: Option<AttachmentMedia>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttachmentMedia {
    pub image: Option<MediaImage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaImage {
    pub src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    message: Option<String>,
    created_time: Option<String>,
    full_picture: Option<String>,
    permalink_url: Option<String>,
    attachments: Option<Attachments>,
    likes: Option<Edge>,
    comments: Option<Edge>,
    shares: Option<Shares>,
}

impl Post {
    fn into_platform(self) -> PlatformVideo {
        let content_type = content_type_of(self.attachments.as_ref());
        let first = self.attachments.and_then(|a| a.data.into_iter().next());
        let (att_title, att_description, att_image) = match first {
            Some(a) => (
                a.title,
                a.description,
                a.media.and_then(|m| m.image).and_then(|i| i.src),
            ),
            None => (None, None, None),
        };
        let message = self.message.filter(|m| !m.is_empty());
        let title = att_title
            .or_else(|| message.as_deref().map(first_line))
            .unwrap_or_else(|| format!("Facebook post {}", self.id));

        PlatformVideo {
            id: self.id,
            title,
            description: message.or(att_description),
            thumbnail_url: self.full_picture.or(att_image),
            duration_seconds: 0,
            published_at: self
                .created_time
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            content_type,
            url: self.permalink_url,
            metrics: MetricsSnapshot {
                views: 0,
                likes: self.likes.map(|e| e.summary.total_count).unwrap_or(0),
                comments: self.comments.map(|e| e.summary.total_count).unwrap_or(0),
                shares: self.shares.map(|s| s.count).unwrap_or(0),
            },
        }
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().chars().take(100).collect()
}

#[derive(Debug, Deserialize)]
struct GraphVideo {
    id: String,
    title: Option<String>,
    description: Option<String>,
    picture: Option<String>,
    length: Option<f64>,
    created_time: Option<String>,
    permalink_url: Option<String>,
    likes: Option<Edge>,
    comments: Option<Edge>,
}

impl GraphVideo {
    fn into_platform(self) -> PlatformVideo {
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Facebook video {}", self.id));
        PlatformVideo {
            id: self.id,
            title,
            description: self.description.filter(|d| !d.is_empty()),
            thumbnail_url: self.picture,
            duration_seconds: self.length.map(|l| l.round() as i64).unwrap_or(0),
            published_at: self
                .created_time
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            content_type: ContentType::Video,
            // permalink_url comes back relative for videos
            url: self
                .permalink_url
                .map(|p| match p.starts_with("http") {
                    true => p,
                    false => format!("https://www.facebook.com{p}"),
                }),
            metrics: MetricsSnapshot {
                views: 0,
                likes: self.likes.map(|e| e.summary.total_count).unwrap_or(0),
                comments: self.comments.map(|e| e.summary.total_count).unwrap_or(0),
                shares: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(raw: serde_json::Value) -> PlatformVideo {
        serde_json::from_value::<Post>(raw).unwrap().into_platform()
    }

    #[test]
    fn video_attachment_marks_post_as_video() {
        let v = post(serde_json::json!({
            "id": "10_20",
            "message": "New upload!\nsecond line",
            "created_time": "2024-05-01T10:00:00+0000",
            "attachments": {"data": [{"media_type": "video", "type": "video_inline"}]},
            "likes": {"data": [], "summary": {"total_count": 12}},
            "comments": {"data": [], "summary": {"total_count": 3}},
            "shares": {"count": 2}
        }));
        assert_eq!(v.content_type, ContentType::Video);
        assert_eq!(v.title, "New upload!");
        assert_eq!(v.metrics.engagement(), 17);
    }

    #[test]
    fn photo_or_bare_posts_stay_posts() {
        let photo = post(serde_json::json!({
            "id": "1_2",
            "attachments": {"data": [{"media_type": "photo", "type": "photo", "title": "Pic"}]}
        }));
        assert_eq!(photo.content_type, ContentType::Post);
        assert_eq!(photo.title, "Pic");

        let bare = post(serde_json::json!({"id": "1_3"}));
        assert_eq!(bare.content_type, ContentType::Post);
        assert_eq!(bare.title, "Facebook post 1_3");
        assert_eq!(bare.metrics, MetricsSnapshot::default());
    }
}
