mod common;

use chrono::Duration;
use common::spawn_app;
use creatorboard::BoardError;
use creatorboard::platforms::Platform;

#[tokio::test]
async fn token_expiring_in_one_minute_is_refreshed() {
    let t = spawn_app().await;
    let creator = t.creator("Ada").await;
    let id = t
        .connect(&creator, "youtube", "yt-old", Some("yt-refresh"), Duration::minutes(1))
        .await;

    let result = t.state.tokens.check_and_refresh_token_if_needed(id).await;

    assert!(result.success, "refresh failed: {:?}", result.error);
    assert_eq!(result.access_token.as_deref(), Some("yt-fresh"));
    assert_eq!(t.mock.tokens(), 1);

    let conn = t.storage.get_connection(id).await.unwrap().unwrap();
    assert_eq!(t.storage.decrypt_access_token(&conn).unwrap(), "yt-fresh");
    // Google does not rotate refresh tokens, the stored one is kept
    assert_eq!(
        t.storage.decrypt_refresh_token(&conn).unwrap().as_deref(),
        Some("yt-refresh")
    );
    assert!(!t.state.tokens.is_token_expiring_soon(conn.token_expiry, chrono::Utc::now()));
}

#[tokio::test]
async fn fresh_token_is_returned_without_refresh() {
    let t = spawn_app().await;
    let creator = t.creator("Grace").await;
    let id = t
        .connect(&creator, "youtube", "yt-current", Some("yt-refresh"), Duration::hours(2))
        .await;

    let token = t.state.tokens.get_valid_access_token(id).await;

    assert_eq!(token.as_deref(), Some("yt-current"));
    assert_eq!(t.mock.tokens(), 0);
}

#[tokio::test]
async fn stored_tokens_are_encrypted_at_rest() {
    let t = spawn_app().await;
    let creator = t.creator("Linus").await;
    let id = t
        .connect(&creator, "twitch", "tw-plain", Some("tw-refresh"), Duration::hours(1))
        .await;

    let conn = t.storage.get_connection(id).await.unwrap().unwrap();
    assert_ne!(conn.access_token, "tw-plain");
    assert_ne!(conn.refresh_token.as_deref(), Some("tw-refresh"));
    assert_eq!(t.storage.decrypt_access_token(&conn).unwrap(), "tw-plain");
}

#[tokio::test]
async fn revoked_refresh_token_is_a_permanent_failure() {
    let t = spawn_app().await;
    let creator = t.creator("Barbara").await;
    let id = t
        .connect(&creator, "twitch", "tw-old", Some("revoked"), Duration::seconds(-30))
        .await;

    let result = t.state.tokens.check_and_refresh_token_if_needed(id).await;

    assert!(!result.success);
    assert!(result.is_permanent_failure());
    assert!(result.access_token.is_none());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn missing_connection_reports_failure() {
    let t = spawn_app().await;
    let result = t.state.tokens.force_refresh(9_999).await;
    assert!(!result.success);
    assert!(!result.is_permanent_failure());
}

#[tokio::test]
async fn rejected_token_triggers_one_refresh_and_retry() {
    let t = spawn_app().await;
    let creator = t.creator("Ken").await;
    let id = t
        .connect(&creator, "twitch", "tw-stale", Some("tw-refresh"), Duration::hours(3))
        .await;

    let platforms = t.state.platforms.clone();
    let identity = t
        .state
        .tokens
        .handle_api_call_with_token_refresh(
            id,
            |token| {
                let platforms = platforms.clone();
                async move { platforms.fetch_identity(Platform::Twitch, &token).await }
            },
            1,
        )
        .await
        .expect("call should succeed after refresh");

    assert_eq!(identity.id, "tw-1");
    assert_eq!(t.mock.tokens(), 1);

    let conn = t.storage.get_connection(id).await.unwrap().unwrap();
    assert_eq!(t.storage.decrypt_access_token(&conn).unwrap(), "tw-fresh");
    assert_eq!(
        t.storage.decrypt_refresh_token(&conn).unwrap().as_deref(),
        Some("tw-rotated")
    );
}

#[tokio::test]
async fn token_error_is_returned_when_retries_are_exhausted() {
    let t = spawn_app().await;
    let creator = t.creator("Dennis").await;
    let id = t
        .connect(&creator, "twitch", "tw-stale", Some("tw-refresh"), Duration::hours(3))
        .await;

    let platforms = t.state.platforms.clone();
    let err = t
        .state
        .tokens
        .handle_api_call_with_token_refresh(
            id,
            |_token| {
                let platforms = platforms.clone();
                // always present the stale token
                async move {
                    platforms
                        .fetch_identity(Platform::Twitch, "tw-stale")
                        .await
                }
            },
            1,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BoardError::UpstreamStatus { .. }));
    assert!(t.state.tokens.is_token_error(&err));
    assert_eq!(t.mock.tokens(), 1);
}
