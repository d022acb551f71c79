mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Duration;
use common::{FRONTEND_URL, KNOWN_YOUTUBE_ID, TestApp, spawn_app};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn send(t: &TestApp, req: Request<Body>) -> Response {
    t.app.clone().oneshot(req).await.expect("request failed")
}

async fn body_json(resp: Response) -> Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not json")
}

fn submit(auth: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("failed to build request")
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).expect("failed to build request")
}

#[tokio::test]
async fn health_reports_database_ok() {
    let t = spawn_app().await;
    let resp = send(&t, get("/api/health", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["database"], "ok");
}

#[tokio::test]
async fn me_requires_a_session() {
    let t = spawn_app().await;
    let resp = send(&t, get("/api/auth/me", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(resp).await["error"].is_string());

    let resp = send(&t, get("/api/auth/me", Some("Bearer not-a-jwt"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_lists_connections_without_secrets() {
    let t = spawn_app().await;
    let ada = t.creator("Ada").await;
    t.connect(&ada, "youtube", "yt-access", Some("yt-refresh"), Duration::hours(1))
        .await;

    let resp = send(&t, get("/api/auth/me", Some(&t.bearer(&ada)))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["creator"]["name"], "Ada");
    assert!(body["creator"]["uidHEX"].as_str().unwrap().len() == 16);
    assert_eq!(body["connections"][0]["platform"], "youtube");
    assert!(body["connections"][0].get("accessToken").is_none());
    assert!(!body.to_string().contains("yt-access"));
}

#[tokio::test]
async fn session_cookie_authenticates_too() {
    let t = spawn_app().await;
    let ada = t.creator("Ada").await;
    let token = t.state.sessions.issue(ada.id).unwrap();
    let req = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("auth-token={token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&t, req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn submission_is_idempotent_per_video_and_rejects_duplicate_urls() {
    let t = spawn_app().await;
    let ada = t.creator("Ada").await;
    t.connect(&ada, "youtube", "yt-access", Some("yt-refresh"), Duration::hours(1))
        .await;
    let auth = t.bearer(&ada);
    let url = format!("https://www.youtube.com/watch?v={KNOWN_YOUTUBE_ID}");

    let resp = send(&t, submit(&auth, "/api/content/submit", json!({ "url": url }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Never Gonna Give You Up");
    assert_eq!(body["validationStatus"], "PENDING");
    assert_eq!(body["durationSeconds"], 213);
    assert_eq!(body["latestMetrics"]["views"], 1000);

    let resp = send(&t, submit(&auth, "/api/content/submit", json!({ "url": url }))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // same video through another URL shape updates the existing row
    let short = format!("https://youtu.be/{KNOWN_YOUTUBE_ID}");
    let resp = send(
        &t,
        submit(&auth, "/api/content/submit", json!({ "url": short, "platform": "youtube" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(&t, get("/api/content", Some(&auth))).await;
    let list = body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let content_id = list[0]["id"].as_i64().unwrap();
    let resp = send(&t, get(&format!("/api/content/{content_id}"), Some(&auth))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["metrics"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn sync_keeps_submitted_url_for_duplicate_detection() {
    let t = spawn_app().await;
    let ada = t.creator("Ada").await;
    t.connect(&ada, "youtube", "yt-access", Some("yt-refresh"), Duration::hours(1))
        .await;
    let auth = t.bearer(&ada);
    let url = format!("https://youtu.be/{KNOWN_YOUTUBE_ID}");

    let resp = send(&t, submit(&auth, "/api/content/submit", json!({ "url": url }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["id"].as_i64().unwrap();

    // the sync reports the canonical watch URL for the same video
    let report = t.state.sync.run_once().await.unwrap();
    assert_eq!(report.items, 1);
    let stored = t.storage.require_content(id).await.unwrap();
    assert_eq!(stored.original_url.as_deref(), Some(url.as_str()));

    let resp = send(&t, submit(&auth, "/api/content/submit", json!({ "url": url }))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(t.storage.metrics_history(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_video_falls_back_to_placeholder() {
    let t = spawn_app().await;
    let ada = t.creator("Ada").await;
    t.connect(&ada, "youtube", "yt-access", Some("yt-refresh"), Duration::hours(1))
        .await;

    let resp = send(
        &t,
        submit(
            &t.bearer(&ada),
            "/api/content/submit",
            json!({ "url": "https://www.youtube.com/watch?v=abcdefghijk" }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "YouTube video abcdefghijk");
    assert_eq!(body["latestMetrics"]["views"], 0);
}

#[tokio::test]
async fn submission_validation_errors() {
    let t = spawn_app().await;
    let ada = t.creator("Ada").await;
    let bob = t.creator("Bob").await;
    let auth = t.bearer(&ada);

    let clip = json!({ "url": "https://clips.twitch.tv/FunnyClipName" });
    let resp = send(&t, submit(&auth, "/api/content/submit", clip)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // no youtube connection yet
    let video = json!({ "url": format!("https://youtu.be/{KNOWN_YOUTUBE_ID}") });
    let resp = send(&t, submit(&auth, "/api/content/submit", video)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let for_bob = json!({ "url": format!("https://youtu.be/{KNOWN_YOUTUBE_ID}"), "creatorId": bob.id });
    let resp = send(&t, submit(&auth, "/api/content/submit", for_bob)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_submits_for_creator_with_own_connection() {
    let t = spawn_app().await;
    let admin = t.super_admin("Root").await;
    let ada = t.creator("Ada").await;
    t.connect(&admin, "twitch", "tw-access", Some("tw-refresh"), Duration::hours(1))
        .await;

    let payload = json!({
        "url": "https://www.twitch.tv/videos/335921245",
        "creatorId": ada.id
    });
    let resp = send(&t, submit(&t.bearer(&admin), "/api/admin/content/submit", payload)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["creatorId"], ada.id);
    assert_eq!(body["title"], "Speedrun VOD");

    // regular creators cannot reach admin routes
    let payload = json!({ "url": "https://www.twitch.tv/videos/1", "creatorId": ada.id });
    let resp = send(&t, submit(&t.bearer(&ada), "/api/admin/content/submit", payload)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_deletes_content_and_metrics() {
    let t = spawn_app().await;
    let ada = t.creator("Ada").await;
    let eve = t.creator("Eve").await;
    t.connect(&ada, "youtube", "yt-access", Some("yt-refresh"), Duration::hours(1))
        .await;
    let auth = t.bearer(&ada);

    let resp = send(
        &t,
        submit(&auth, "/api/content/submit", json!({ "url": format!("https://youtu.be/{KNOWN_YOUTUBE_ID}") })),
    )
    .await;
    let id = body_json(resp).await["id"].as_i64().unwrap();

    let delete = |auth: String| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/content/{id}"))
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    };
    assert_eq!(send(&t, delete(t.bearer(&eve))).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(send(&t, delete(auth.clone())).await.status(), StatusCode::OK);
    assert!(t.storage.get_content(id).await.unwrap().is_none());
    assert!(t.storage.metrics_history(id).await.unwrap().is_empty());
    assert_eq!(send(&t, delete(auth)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn leaderboard_is_ranked_by_total_points() {
    let t = spawn_app().await;
    for (name, points, region) in [("Low", 10, "EU"), ("High", 500, "US"), ("Mid", 120, "EU")] {
        let c = t.creator(name).await;
        t.storage
            .update_creator(
                c.id,
                &creatorboard::db::models::CreatorUpdate {
                    total_points: Some(points),
                    region: Some(region.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let body = body_json(send(&t, get("/api/leaderboard/creators", None)).await).await;
    let names: Vec<&str> = body["creators"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["High", "Mid", "Low"]);
    assert_eq!(body["creators"][0]["rank"], 1);

    let body = body_json(send(&t, get("/api/leaderboard/creators?region=EU&limit=1", None)).await).await;
    assert_eq!(body["creators"].as_array().unwrap().len(), 1);
    assert_eq!(body["creators"][0]["name"], "Mid");
}

#[tokio::test]
async fn admin_routes_update_creators_and_status() {
    let t = spawn_app().await;
    let admin = t.super_admin("Root").await;
    let ada = t.creator("Ada Lovelace").await;
    let auth = t.bearer(&admin);

    let body = body_json(send(&t, get("/api/admin/creators/search?q=lovelace", Some(&auth))).await).await;
    assert_eq!(body[0]["id"], ada.id);

    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/api/admin/creators/{}", ada.id))
        .header(header::AUTHORIZATION, &auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "tier": "gold", "referralPoints": 25 }).to_string()))
        .unwrap();
    let body = body_json(send(&t, req).await).await;
    assert_eq!(body["tier"], "gold");
    assert_eq!(body["totalPoints"], 25);

    let resp = send(&t, get("/api/debug/connections", Some(&t.bearer(&ada)))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&t, get("/api/debug/connections", Some(&auth))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin_with_credentials() {
    let t = spawn_app().await;
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/content/submit")
        .header(header::ORIGIN, FRONTEND_URL)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let resp = send(&t, req).await;
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        FRONTEND_URL
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn oauth_login_creates_creator_and_redirects_with_session() {
    let t = spawn_app().await;

    let resp = send(&t, get("/api/auth/twitch", None)).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with(&format!("{}/twitch/authorize", t.mock_base)));
    let cookies: Vec<String> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter(|kv| !kv.ends_with('='))
        .map(str::to_string)
        .collect();
    let state = url::Url::parse(&location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let req = Request::builder()
        .uri(format!("/api/auth/twitch/callback?code=tw-code&state={state}"))
        .header(header::COOKIE, cookies.join("; "))
        .body(Body::empty())
        .unwrap();
    let resp = send(&t, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{FRONTEND_URL}/auth/callback?token=")));
    assert!(location.ends_with("&platform=twitch"));
    assert!(
        resp.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("auth-token="))
    );

    let conns = t.storage.list_connections().await.unwrap();
    assert_eq!(conns.len(), 1);
    assert_eq!(conns[0].platform_user_id, "tw-1");
    let creator = t.storage.require_creator(conns[0].creator_id).await.unwrap();
    assert_eq!(creator.name, "Streamer");
}

#[tokio::test]
async fn oauth_callback_rejects_state_mismatch() {
    let t = spawn_app().await;
    let resp = send(&t, get("/api/auth/twitch", None)).await;
    let cookies: Vec<String> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect();

    let req = Request::builder()
        .uri("/api/auth/twitch/callback?code=tw-code&state=forged")
        .header(header::COOKIE, cookies.join("; "))
        .body(Body::empty())
        .unwrap();
    let resp = send(&t, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(t.storage.list_connections().await.unwrap().is_empty());
}
