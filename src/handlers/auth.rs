use crate::db::models::{ConnectionSummary, Creator, CreatorId};
use crate::middleware::{CurrentCreator, MaybeCreator};
use crate::platforms::Platform;
use crate::{BoardError, router::BoardState};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub creator: Creator,
    pub connections: Vec<ConnectionSummary>,
}

const CSRF_COOKIE: &str = "oauth_csrf_token";
const LINK_COOKIE: &str = "oauth_link_creator";

fn parse_platform(raw: &str) -> Result<Platform, BoardError> {
    Platform::parse(raw).ok_or_else(|| BoardError::NotFound(format!("Unknown platform: {raw}")))
}

/// GET /api/auth/{platform} -> redirects to the platform consent page.
/// A signed-in creator links the account instead of logging in.
pub async fn auth_entry(
    State(state): State<BoardState>,
    Path(platform): Path<String>,
    MaybeCreator(current): MaybeCreator,
    jar: PrivateCookieJar,
) -> Result<Response, BoardError> {
    let platform = parse_platform(&platform)?;
    let (auth_url, csrf_token) = state.platforms.auth_url(platform)?;

    let mut jar = jar.add(build_cookie(CSRF_COOKIE, csrf_token.secret().to_string()));
    jar = match current.as_ref() {
        Some(creator) => jar.add(build_cookie(LINK_COOKIE, creator.id.to_string())),
        None => jar.remove(clear_cookie(LINK_COOKIE)),
    };

    info!(%platform, linking = current.is_some(), "dispatching OAuth redirect");
    Ok((jar, Redirect::temporary(auth_url.as_str())).into_response())
}

/// GET /api/auth/{platform}/callback -> exchanges the code, issues a session
/// and sends the browser back to the frontend.
pub async fn auth_callback(
    State(state): State<BoardState>,
    Path(platform): Path<String>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
    cookies: CookieJar,
) -> Response {
    let (csrf_cookie, link_to, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    let platform = match parse_platform(&platform) {
        Ok(p) => p,
        Err(err) => return respond_with_error(jar, err),
    };

    if let Some(error) = query.error.as_deref() {
        let detail = query.error_description.as_deref().unwrap_or(error);
        return respond_with_error(
            jar,
            BoardError::OauthFlow(format!("authorization denied: {detail}")),
        );
    }

    let state_param = match query.state.as_deref() {
        Some(s) => s,
        None => {
            return respond_with_error(
                jar,
                BoardError::OauthFlow("missing `state` in callback".to_string()),
            );
        }
    };

    if !bool::from(state_param.as_bytes().ct_eq(csrf_cookie.as_bytes())) {
        return respond_with_error(jar, BoardError::OauthFlow("CSRF token mismatch".to_string()));
    }

    let code = match query.code.as_deref() {
        Some(code) => code,
        None => {
            return respond_with_error(
                jar,
                BoardError::OauthFlow("missing `code` in callback".to_string()),
            );
        }
    };

    let outcome = match state.connections.handle_callback(platform, code, link_to).await {
        Ok(outcome) => outcome,
        Err(err) => return respond_with_error(jar, err),
    };

    let token = match state.sessions.issue(outcome.creator.id) {
        Ok(token) => token,
        Err(err) => return respond_with_error(jar, err),
    };

    let redirect = match frontend_redirect(&state.config.basic.frontend_url, &token, platform) {
        Ok(url) => url,
        Err(err) => return respond_with_error(jar, err),
    };

    let cookies = cookies.add(session_cookie(&state, token));
    info!(creator_id = outcome.creator.id, %platform, "OAuth callback completed");
    (jar, cookies, Redirect::to(redirect.as_str())).into_response()
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<BoardState>,
    CurrentCreator(creator): CurrentCreator,
) -> Result<Json<MeResponse>, BoardError> {
    let connections = state
        .storage
        .list_connections_for_creator(creator.id)
        .await?
        .iter()
        .map(ConnectionSummary::from)
        .collect();
    Ok(Json(MeResponse {
        creator,
        connections,
    }))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<BoardState>, cookies: CookieJar) -> impl IntoResponse {
    let name = state.sessions.cookie_name().to_string();
    let cookies = cookies.remove(Cookie::build(Cookie::new(name, "")).path("/").build());
    (cookies, Json(json!({ "success": true })))
}

fn frontend_redirect(frontend_url: &str, token: &str, platform: Platform) -> Result<Url, BoardError> {
    let mut url = Url::parse(&format!(
        "{}/auth/callback",
        frontend_url.trim_end_matches('/')
    ))?;
    url.query_pairs_mut()
        .append_pair("token", token)
        .append_pair("platform", platform.as_str());
    Ok(url)
}

fn session_cookie(state: &BoardState, token: String) -> Cookie<'static> {
    let max_age = Duration::seconds(state.sessions.ttl().num_seconds());
    Cookie::build(Cookie::new(state.sessions.cookie_name().to_string(), token))
        .path("/")
        .http_only(true)
        .secure(!state.config.auth.insecure_cookie)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, Option<CreatorId>, PrivateCookieJar), (PrivateCookieJar, BoardError)> {
    let Some(csrf_cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            BoardError::OauthFlow("Missing CSRF token in cookie".to_string()),
        ));
    };
    let link_to = jar
        .get(LINK_COOKIE)
        .and_then(|c| c.value().parse::<CreatorId>().ok());

    let jar = clear_oauth_cookies(jar);
    Ok((csrf_cookie, link_to, jar))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(LINK_COOKIE))
}

fn build_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: BoardError) -> Response {
    (jar, err.into_response()).into_response()
}
