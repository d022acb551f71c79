#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::{AUTHORIZATION, HOST}},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use creatorboard::config::{Config, HttpConfig};
use creatorboard::db::models::{Creator, CreatorUpdate, NewConnection};
use creatorboard::platforms::http::build_http_client;
use creatorboard::{BoardState, BoardStorage, TokenCipher, board_router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

pub const KNOWN_YOUTUBE_ID: &str = "dQw4w9WgXcQ";
pub const TWITCH_VOD_ID: &str = "335921245";
pub const FRONTEND_URL: &str = "http://localhost:3000";
pub const FACEBOOK_VIDEO_ID: &str = "777";
pub const FACEBOOK_LONG_LIVED: &str = "fb-long";

/// Request counters of the fake platform server.
#[derive(Clone, Default)]
pub struct MockCounters {
    pub token_calls: Arc<AtomicUsize>,
    pub api_calls: Arc<AtomicUsize>,
}

impl MockCounters {
    pub fn tokens(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

pub struct TestApp {
    pub state: BoardState,
    pub app: Router,
    pub storage: BoardStorage,
    pub mock: MockCounters,
    pub mock_base: String,
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

async fn youtube_token(
    State(m): State<MockCounters>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    m.token_calls.fetch_add(1, Ordering::SeqCst);
    match (
        form.get("grant_type").map(String::as_str),
        form.get("refresh_token").map(String::as_str),
        form.get("code").map(String::as_str),
    ) {
        (Some("refresh_token"), Some("yt-refresh"), _) => Json(json!({
            "access_token": "yt-fresh",
            "token_type": "Bearer",
            "expires_in": 3599
        }))
        .into_response(),
        (Some("authorization_code"), _, Some("yt-code")) => Json(json!({
            "access_token": "yt-access",
            "refresh_token": "yt-refresh",
            "token_type": "Bearer",
            "expires_in": 3599
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Token has been revoked." })),
        )
            .into_response(),
    }
}

async fn youtube_channels(State(m): State<MockCounters>) -> Json<Value> {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "items": [{
            "id": "UC123",
            "snippet": { "title": "Tuber", "customUrl": "@tuber" },
            "contentDetails": { "relatedPlaylists": { "uploads": "UU123" } }
        }]
    }))
}

async fn youtube_playlist_items(State(m): State<MockCounters>) -> Json<Value> {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "items": [{ "contentDetails": { "videoId": KNOWN_YOUTUBE_ID } }] }))
}

async fn youtube_videos(
    State(m): State<MockCounters>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    let published = (Utc::now() - Duration::days(3)).to_rfc3339();
    let items: Vec<Value> = q
        .get("id")
        .map(|ids| ids.split(',').filter(|id| *id == KNOWN_YOUTUBE_ID).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .map(|id| {
            json!({
                "id": id,
                "snippet": {
                    "title": "Never Gonna Give You Up",
                    "description": "Official video",
                    "publishedAt": published,
                    "thumbnails": { "high": { "url": "https://i.ytimg.com/vi/x/hqdefault.jpg" } },
                    "liveBroadcastContent": "none"
                },
                "contentDetails": { "duration": "PT3M33S" },
                "statistics": { "viewCount": "1000", "likeCount": "40", "commentCount": "10" }
            })
        })
        .collect();
    Json(json!({ "items": items }))
}

async fn twitch_token(
    State(m): State<MockCounters>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    m.token_calls.fetch_add(1, Ordering::SeqCst);
    match (
        form.get("grant_type").map(String::as_str),
        form.get("refresh_token").map(String::as_str),
        form.get("code").map(String::as_str),
    ) {
        (Some("refresh_token"), Some("tw-refresh"), _) => Json(json!({
            "access_token": "tw-fresh",
            "refresh_token": "tw-rotated",
            "expires_in": 14400,
            "scope": ["user:read:email"],
            "token_type": "bearer"
        }))
        .into_response(),
        (Some("authorization_code"), _, Some("tw-code")) => Json(json!({
            "access_token": "tw-access",
            "refresh_token": "tw-refresh",
            "expires_in": 14400,
            "scope": ["user:read:email"],
            "token_type": "bearer"
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": 400, "message": "Invalid refresh token" })),
        )
            .into_response(),
    }
}

fn twitch_unauthorized(headers: &HeaderMap) -> Option<Response> {
    (bearer(headers) == "tw-stale").then(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized", "status": 401, "message": "Invalid OAuth token" })),
        )
            .into_response()
    })
}

async fn twitch_users(State(m): State<MockCounters>, headers: HeaderMap) -> Response {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(resp) = twitch_unauthorized(&headers) {
        return resp;
    }
    Json(json!({ "data": [{ "id": "tw-1", "login": "streamer", "display_name": "Streamer" }] }))
        .into_response()
}

async fn twitch_videos(State(m): State<MockCounters>, headers: HeaderMap) -> Response {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(resp) = twitch_unauthorized(&headers) {
        return resp;
    }
    Json(json!({
        "data": [{
            "id": TWITCH_VOD_ID,
            "title": "Speedrun VOD",
            "description": "",
            "url": format!("https://www.twitch.tv/videos/{TWITCH_VOD_ID}"),
            "thumbnail_url": "https://static-cdn.jtvnw.net/cf_vods/abc/thumb/thumb0-%{width}x%{height}.jpg",
            "view_count": 1200,
            "published_at": (Utc::now() - Duration::days(2)).to_rfc3339(),
            "duration": "1h2m3s",
            "type": "archive"
        }],
        "pagination": {}
    }))
    .into_response()
}

fn graph_token_error() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": {
                "message": "Error validating access token: The session has been invalidated.",
                "type": "OAuthException",
                "code": 190
            }
        })),
    )
        .into_response()
}

async fn facebook_token(
    State(m): State<MockCounters>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    m.token_calls.fetch_add(1, Ordering::SeqCst);
    match (
        q.get("grant_type").map(String::as_str),
        q.get("fb_exchange_token").map(String::as_str),
        q.get("code").map(String::as_str),
    ) {
        (Some("fb_exchange_token"), Some("fb-short" | FACEBOOK_LONG_LIVED), _) => Json(json!({
            "access_token": FACEBOOK_LONG_LIVED,
            "token_type": "bearer",
            "expires_in": 5_183_944
        }))
        .into_response(),
        (None, _, Some("fb-code")) => Json(json!({
            "access_token": "fb-short",
            "token_type": "bearer",
            "expires_in": 3600
        }))
        .into_response(),
        _ => graph_token_error(),
    }
}

async fn facebook_me(State(m): State<MockCounters>) -> Json<Value> {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "id": "fb-1", "name": "Page Owner" }))
}

/// Two pages: a video post linking to a page holding a photo post.
async fn facebook_posts(
    State(m): State<MockCounters>,
    Path(user): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    let created = (Utc::now() - Duration::days(1)).format("%Y-%m-%dT%H:%M:%S%z").to_string();
    if q.get("after").map(String::as_str) == Some("page2") {
        return Json(json!({
            "data": [{
                "id": format!("{user}_200"),
                "message": "Behind the scenes",
                "created_time": created,
                "full_picture": "https://scontent.example/photo.jpg",
                "permalink_url": format!("https://www.facebook.com/{user}/posts/200"),
                "attachments": { "data": [{ "media_type": "photo", "type": "photo" }] },
                "likes": { "data": [], "summary": { "total_count": 7 } },
                "comments": { "data": [], "summary": { "total_count": 1 } }
            }],
            "paging": {}
        }));
    }
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("127.0.0.1");
    Json(json!({
        "data": [{
            "id": format!("{user}_100"),
            "message": "Full match highlights",
            "created_time": created,
            "permalink_url": format!("https://www.facebook.com/{user}/posts/100"),
            "attachments": { "data": [{ "media_type": "video", "type": "video_inline" }] },
            "likes": { "data": [], "summary": { "total_count": 30 } },
            "comments": { "data": [], "summary": { "total_count": 4 } },
            "shares": { "count": 2 }
        }],
        "paging": { "next": format!("http://{host}/facebook/graph/{user}/posts?after=page2") }
    }))
}

async fn facebook_item(
    State(m): State<MockCounters>,
    Path(id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    m.api_calls.fetch_add(1, Ordering::SeqCst);
    let created = (Utc::now() - Duration::days(2)).format("%Y-%m-%dT%H:%M:%S%z").to_string();
    let wants_video = q.get("fields").is_some_and(|f| f.contains("length"));
    if wants_video && id == FACEBOOK_VIDEO_ID {
        return Json(json!({
            "id": id,
            "title": "Live replay",
            "description": "Saturday stream",
            "picture": "https://scontent.example/replay.jpg",
            "length": 95.4,
            "created_time": created,
            "permalink_url": format!("/somepage/videos/{id}/"),
            "likes": { "data": [], "summary": { "total_count": 5 } },
            "comments": { "data": [], "summary": { "total_count": 2 } }
        }));
    }
    Json(json!({
        "id": id,
        "message": "Hello fans\nthanks for watching",
        "created_time": created,
        "full_picture": "https://scontent.example/post.jpg",
        "likes": { "data": [], "summary": { "total_count": 9 } },
        "comments": { "data": [], "summary": { "total_count": 0 } },
        "shares": { "count": 1 }
    }))
}

/// Serve fake YouTube, Twitch and Facebook endpoints on an ephemeral port.
pub async fn spawn_mock_platforms() -> (String, MockCounters) {
    let counters = MockCounters::default();
    let app = Router::new()
        .route("/youtube/token", post(youtube_token))
        .route("/youtube/api/channels", get(youtube_channels))
        .route("/youtube/api/playlistItems", get(youtube_playlist_items))
        .route("/youtube/api/videos", get(youtube_videos))
        .route("/twitch/token", post(twitch_token))
        .route("/twitch/helix/users", get(twitch_users))
        .route("/twitch/helix/videos", get(twitch_videos))
        .route("/facebook/oauth/access_token", get(facebook_token))
        .route("/facebook/graph/me", get(facebook_me))
        .route("/facebook/graph/{id}", get(facebook_item))
        .route("/facebook/graph/{id}/posts", get(facebook_posts))
        .with_state(counters.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock listener");
    let addr = listener.local_addr().expect("mock listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server failed");
    });
    (format!("http://{addr}"), counters)
}

pub fn test_config(mock_base: &str) -> Config {
    let mut cfg = Config::default();
    cfg.basic.public_url = "http://localhost:8000".to_string();
    cfg.basic.frontend_url = FRONTEND_URL.to_string();
    cfg.basic.cors_origins = vec![FRONTEND_URL.to_string()];
    cfg.auth.jwt_secret = "test-jwt-secret".to_string();
    cfg.auth.cookie_secret = "test-cookie-secret".to_string();
    cfg.auth.insecure_cookie = true;
    cfg.sync.batch_delay_ms = 0;

    let yt = &mut cfg.providers.youtube;
    yt.client_id = "yt-client".to_string();
    yt.client_secret = "yt-secret".to_string();
    yt.auth_url = format!("{mock_base}/youtube/authorize");
    yt.token_url = format!("{mock_base}/youtube/token");
    yt.api_base = format!("{mock_base}/youtube/api");

    let tw = &mut cfg.providers.twitch;
    tw.client_id = "tw-client".to_string();
    tw.client_secret = "tw-secret".to_string();
    tw.auth_url = format!("{mock_base}/twitch/authorize");
    tw.token_url = format!("{mock_base}/twitch/token");
    tw.api_base = format!("{mock_base}/twitch/helix");

    let fb = &mut cfg.providers.facebook;
    fb.client_id = "fb-client".to_string();
    fb.client_secret = "fb-secret".to_string();
    fb.auth_url = format!("{mock_base}/facebook/dialog/oauth");
    fb.token_url = format!("{mock_base}/facebook/oauth/access_token");
    fb.api_base = format!("{mock_base}/facebook/graph");
    cfg
}

pub async fn spawn_app() -> TestApp {
    let (mock_base, mock) = spawn_mock_platforms().await;
    let cfg = test_config(&mock_base);
    let storage = creatorboard::db::connect("sqlite::memory:", TokenCipher::new("test-key"))
        .await
        .expect("failed to open in-memory storage");
    let http = build_http_client(&HttpConfig::default()).expect("failed to build http client");
    let state = BoardState::new(Arc::new(cfg), storage.clone(), http);
    let app = board_router(state.clone());
    TestApp {
        state,
        app,
        storage,
        mock,
        mock_base,
    }
}

impl TestApp {
    pub async fn creator(&self, name: &str) -> Creator {
        self.storage
            .create_creator(name, FRONTEND_URL)
            .await
            .expect("failed to create creator")
    }

    pub async fn super_admin(&self, name: &str) -> Creator {
        let creator = self.creator(name).await;
        self.storage
            .update_creator(
                creator.id,
                &CreatorUpdate {
                    is_super_admin: Some(true),
                    ..CreatorUpdate::default()
                },
            )
            .await
            .expect("failed to promote creator")
    }

    /// Store a connection whose access token expires `expires_in` from now.
    pub async fn connect(
        &self,
        creator: &Creator,
        platform: &str,
        access: &str,
        refresh: Option<&str>,
        expires_in: Duration,
    ) -> i64 {
        let platform_user_id = match platform {
            "youtube" => "UC123",
            "twitch" => "tw-1",
            _ => "fb-1",
        };
        self.storage
            .upsert_connection(NewConnection {
                creator_id: creator.id,
                platform: platform.to_string(),
                platform_user_id: format!("{platform_user_id}-{}", creator.id),
                platform_username: Some(creator.name.clone()),
                access_token: access.to_string(),
                refresh_token: refresh.map(str::to_string),
                token_expiry: Some(Utc::now() + expires_in),
            })
            .await
            .expect("failed to store connection")
    }

    pub fn bearer(&self, creator: &Creator) -> String {
        let token = self
            .state
            .sessions
            .issue(creator.id)
            .expect("failed to issue session");
        format!("Bearer {token}")
    }
}
