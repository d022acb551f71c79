//! Manual content submission by URL.

use crate::config::ScoringConfig;
use crate::db::models::{
    ContentId, ContentType, ContentWithMetrics, Creator, CreatorId, MetricsSnapshot, NewContent,
    ValidationStatus,
};
use crate::db::BoardStorage;
use crate::error::BoardError;
use crate::platforms::{Platform, PlatformClient, PlatformVideo, VideoRef};
use crate::service::scoring::recompute_creator_score;
use crate::service::token_refresh::TokenRefreshService;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{info, warn};
use url::Url;

static TRIPLE_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/{3}").expect("valid regex"));

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("valid regex")
});

static TWITCH_CLIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:clips\.twitch\.tv/|twitch\.tv/[^/?#]+/clip/)").expect("valid regex")
});

static TWITCH_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"twitch\.tv/(?:[^/?#]+/)?videos?/(\d+)").expect("valid regex"));

static FACEBOOK_VIDEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:facebook\.com/(?:[^?#]+/)?videos/(?:[^/?#]+/)?(\d+)|facebook\.com/watch/?\?(?:[^#]*&)?v=(\d+)|facebook\.com/reel/(\d+)|fb\.watch/([A-Za-z0-9_-]+))",
    )
    .expect("valid regex")
});

static FACEBOOK_POST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:facebook\.com/[^/?#]+/posts/([A-Za-z0-9_]+)|story_fbid=([A-Za-z0-9_]+))")
        .expect("valid regex")
});

/// Body of `POST /api/content/submit` and the admin variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub url: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub creator_id: Option<CreatorId>,
}

/// Normalize a thumbnail or content URL.
///
/// Triple slashes become double, consecutive duplicated path segments are
/// collapsed and Twitch `{width}`/`{height}` templates are filled with 1280x720.
pub fn clean_url(raw: &str) -> String {
    let url = TRIPLE_SLASH.replace_all(raw.trim(), "//");

    let (head, rest) = match url.find("://") {
        Some(i) => url.split_at(i + 3),
        None => ("", &url[..]),
    };
    let (path, query) = match rest.find(['?', '#']) {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        if !seg.is_empty() && segments.last() == Some(&seg) {
            continue;
        }
        segments.push(seg);
    }

    format!("{head}{}{query}", segments.join("/"))
        .replace("%{width}", "1280")
        .replace("{width}", "1280")
        .replace("%{height}", "720")
        .replace("{height}", "720")
}

fn detect_platform(url: &str) -> Option<Platform> {
    let lower = url.to_ascii_lowercase();
    if lower.contains("youtube.com") || lower.contains("youtu.be") {
        Some(Platform::Youtube)
    } else if lower.contains("twitch.tv") {
        Some(Platform::Twitch)
    } else if lower.contains("facebook.com") || lower.contains("fb.watch") {
        Some(Platform::Facebook)
    } else {
        None
    }
}

fn first_group(caps: &regex::Captures<'_>) -> Option<String> {
    caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string())
}

/// Resolve a submitted URL into a platform item id.
pub fn extract_video_ref(url: &str, platform_hint: Option<&str>) -> Result<VideoRef, BoardError> {
    let detected = detect_platform(url);
    let platform = match platform_hint.filter(|p| !p.trim().is_empty()) {
        Some(hint) => {
            let p = Platform::parse(hint)
                .ok_or_else(|| BoardError::BadRequest(format!("Unsupported platform: {hint}")))?;
            if detected.is_some_and(|d| d != p) {
                return Err(BoardError::BadRequest(format!(
                    "URL does not belong to {}",
                    p.display_name()
                )));
            }
            p
        }
        None => detected
            .ok_or_else(|| BoardError::BadRequest("Unsupported platform URL".to_string()))?,
    };

    let unsupported = || BoardError::BadRequest(format!("Unsupported {} URL", platform.display_name()));
    let (id, content_type) = match platform {
        Platform::Youtube => {
            let id = YOUTUBE_ID
                .captures(url)
                .and_then(|c| first_group(&c))
                .ok_or_else(unsupported)?;
            (id, ContentType::Video)
        }
        Platform::Twitch => {
            if TWITCH_CLIP.is_match(url) {
                return Err(BoardError::BadRequest(
                    "Twitch clips are not supported, submit the VOD URL instead".to_string(),
                ));
            }
            let id = TWITCH_VIDEO
                .captures(url)
                .and_then(|c| first_group(&c))
                .ok_or_else(unsupported)?;
            (id, ContentType::Video)
        }
        Platform::Facebook => {
            if let Some(id) = FACEBOOK_VIDEO.captures(url).and_then(|c| first_group(&c)) {
                (id, ContentType::Video)
            } else {
                let id = FACEBOOK_POST
                    .captures(url)
                    .and_then(|c| first_group(&c))
                    .ok_or_else(unsupported)?;
                (id, ContentType::Post)
            }
        }
    };
    Ok(VideoRef {
        platform,
        id,
        content_type,
    })
}

fn placeholder(video: &VideoRef) -> PlatformVideo {
    PlatformVideo {
        id: video.id.clone(),
        title: format!("{} video {}", video.platform.display_name(), video.id),
        description: None,
        thumbnail_url: None,
        duration_seconds: 0,
        published_at: Utc::now(),
        content_type: video.content_type,
        url: None,
        metrics: MetricsSnapshot::default(),
    }
}

#[derive(Clone)]
pub struct SubmissionService {
    storage: BoardStorage,
    platforms: PlatformClient,
    tokens: TokenRefreshService,
    scoring: ScoringConfig,
}

impl SubmissionService {
    pub fn new(
        storage: BoardStorage,
        platforms: PlatformClient,
        tokens: TokenRefreshService,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            storage,
            platforms,
            tokens,
            scoring,
        }
    }

    /// Submit `req.url` on behalf of `req.creator_id` (super-admins) or `actor`.
    ///
    /// Metadata is fetched with the actor's own connection; platform failures
    /// fall back to placeholder metadata and zero metrics.
    pub async fn submit(
        &self,
        actor: &Creator,
        req: SubmissionRequest,
    ) -> Result<ContentWithMetrics, BoardError> {
        let target_id = req.creator_id.unwrap_or(actor.id);
        if target_id != actor.id && !actor.is_super_admin {
            return Err(BoardError::Forbidden(
                "Only super admins can submit content for other creators".to_string(),
            ));
        }
        let target = self.storage.require_creator(target_id).await?;

        let url = req.url.trim();
        if url.is_empty() {
            return Err(BoardError::BadRequest("URL is required".to_string()));
        }
        Url::parse(url).map_err(|_| BoardError::BadRequest("Invalid URL".to_string()))?;
        let video = extract_video_ref(url, req.platform.as_deref())?;

        if self.storage.find_content_by_url(target.id, url).await?.is_some() {
            return Err(BoardError::Conflict("Content already submitted".to_string()));
        }
        if let Some(existing) = self
            .storage
            .find_content_by_platform_id(video.platform.as_str(), &video.id)
            .await?
            && existing.creator_id != target.id
        {
            return Err(BoardError::Conflict(
                "Content is already claimed by another creator".to_string(),
            ));
        }

        let conn = self
            .storage
            .find_connection(actor.id, video.platform.as_str())
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| {
                BoardError::BadRequest(format!(
                    "No active {} connection, link your account first",
                    video.platform.display_name()
                ))
            })?;

        let meta = match self
            .tokens
            .handle_api_call_with_token_refresh(
                conn.id,
                |token| {
                    let platforms = &self.platforms;
                    let video = &video;
                    async move { platforms.fetch_video(&token, video).await }
                },
                1,
            )
            .await
        {
            Ok(meta) => meta,
            Err(e) => {
                warn!(platform = %video.platform, video_id = %video.id, error = %e, "metadata lookup failed, using placeholder");
                placeholder(&video)
            }
        };

        let now = Utc::now();
        let content = self
            .storage
            .upsert_content(&NewContent {
                creator_id: target.id,
                platform: video.platform.as_str().to_string(),
                platform_video_id: video.id.clone(),
                title: meta.title,
                description: meta.description,
                thumbnail_url: meta.thumbnail_url.as_deref().map(clean_url),
                duration_seconds: meta.duration_seconds,
                published_at: meta.published_at,
                content_type: meta.content_type,
                validation_status: ValidationStatus::Pending,
                original_url: Some(url.to_string()),
            })
            .await?;
        let metrics = self.storage.insert_metrics(content.id, meta.metrics, now).await?;
        recompute_creator_score(&self.storage, &self.scoring, target.id, now).await?;

        info!(
            content_id = content.id,
            creator_id = target.id,
            actor_id = actor.id,
            platform = %video.platform,
            "content submitted"
        );
        Ok(ContentWithMetrics {
            content,
            latest_metrics: Some(metrics),
        })
    }

    /// Delete content and its metrics. Owners and super-admins only.
    pub async fn delete_content(&self, actor: &Creator, id: ContentId) -> Result<(), BoardError> {
        let content = self.storage.require_content(id).await?;
        if content.creator_id != actor.id && !actor.is_super_admin {
            return Err(BoardError::Forbidden("Not your content".to_string()));
        }
        if !self.storage.delete_content(id).await? {
            return Err(BoardError::NotFound("Content not found".to_string()));
        }
        recompute_creator_score(&self.storage, &self.scoring, content.creator_id, Utc::now())
            .await?;
        info!(content_id = id, actor_id = actor.id, "content deleted");
        Ok(())
    }
}
