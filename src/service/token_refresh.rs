//! Expiry-driven refresh of platform credentials.
//!
//! Connections are refreshed when their access token is within the refresh
//! margin of expiring. API calls made through
//! [`TokenRefreshService::handle_api_call_with_token_refresh`] additionally
//! refresh once when the platform rejects the token mid-flight.

use crate::config::TokenConfig;
use crate::db::models::{ConnectionId, DbConnection};
use crate::db::BoardStorage;
use crate::error::BoardError;
use crate::platforms::{Platform, PlatformClient};
use chrono::{DateTime, Duration, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Serialize;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Substrings that mark an upstream error as a rejected or expired token.
const TOKEN_ERROR_MARKERS: &[&str] = &[
    "401",
    "unauthorized",
    "invalid_token",
    "invalid token",
    "token expired",
    "expired token",
    "invalid credentials",
    "invalid_grant",
];

/// Graph API code for an expired, revoked or otherwise invalid access token.
const GRAPH_INVALID_TOKEN: i64 = 190;

fn graph_error_code(body: &str) -> Option<i64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .get("code")?
        .as_i64()
}

/// Outcome of a refresh attempt. Refresh failures are reported here instead
/// of being returned as errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The platform rejected the stored credentials; retrying will not help.
    #[serde(skip)]
    pub permanent: bool,
}

impl RefreshResult {
    fn ok(access_token: String) -> Self {
        Self {
            success: true,
            access_token: Some(access_token),
            error: None,
            permanent: false,
        }
    }

    pub fn is_permanent_failure(&self) -> bool {
        !self.success && self.permanent
    }

    /// The access token, or the failure as an error. Permanent failures map
    /// to [`BoardError::TokenRevoked`].
    pub fn into_token(self, id: ConnectionId) -> Result<String, BoardError> {
        let permanent = self.is_permanent_failure();
        match self.access_token {
            Some(token) if self.success => Ok(token),
            _ => {
                let reason = self
                    .error
                    .unwrap_or_else(|| format!("connection {id} has no usable access token"));
                Err(if permanent {
                    BoardError::TokenRevoked(reason)
                } else {
                    BoardError::Unauthorized(reason)
                })
            }
        }
    }

    fn failed(error: impl Into<String>, permanent: bool) -> Self {
        Self {
            success: false,
            access_token: None,
            error: Some(error.into()),
            permanent,
        }
    }
}

/// True when `expiry` is within `margin` of `now`, including already expired.
pub fn expires_within(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>, margin: Duration) -> bool {
    expiry.is_some_and(|at| at <= now + margin)
}

/// Whether `err` looks like the platform refusing the access token.
pub fn is_token_error(err: &BoardError) -> bool {
    if let BoardError::UpstreamStatus { status, body } = err
        && (*status == StatusCode::UNAUTHORIZED
            || graph_error_code(body) == Some(GRAPH_INVALID_TOKEN))
    {
        return true;
    }
    let msg = err.to_string().to_ascii_lowercase();
    TOKEN_ERROR_MARKERS.iter().any(|m| msg.contains(m))
}

#[derive(Clone)]
pub struct TokenRefreshService {
    storage: BoardStorage,
    platforms: PlatformClient,
    margin: Duration,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl TokenRefreshService {
    pub fn new(storage: BoardStorage, platforms: PlatformClient, cfg: &TokenConfig) -> Self {
        let per_minute = NonZeroU32::new(cfg.refresh_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            storage,
            platforms,
            margin: Duration::seconds(cfg.refresh_margin_secs.max(0)),
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    pub fn is_token_expiring_soon(&self, expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        expires_within(expiry, now, self.margin)
    }

    pub fn is_token_expired(&self, expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        expires_within(expiry, now, Duration::zero())
    }

    pub fn is_token_error(&self, err: &BoardError) -> bool {
        is_token_error(err)
    }

    /// Return the stored access token, refreshing it first when it is about to expire.
    pub async fn check_and_refresh_token_if_needed(&self, id: ConnectionId) -> RefreshResult {
        let conn = match self.load(id).await {
            Ok(conn) => conn,
            Err(result) => return result,
        };
        if self.is_token_expiring_soon(conn.token_expiry, Utc::now()) {
            debug!(connection_id = id, platform = %conn.platform, "access token expiring, refreshing");
            return self.refresh_connection(&conn).await;
        }
        match self.storage.decrypt_access_token(&conn) {
            Ok(token) => RefreshResult::ok(token),
            Err(e) => RefreshResult::failed(e.to_string(), true),
        }
    }

    /// Refresh regardless of the stored expiry.
    pub async fn force_refresh(&self, id: ConnectionId) -> RefreshResult {
        match self.load(id).await {
            Ok(conn) => self.refresh_connection(&conn).await,
            Err(result) => result,
        }
    }

    pub async fn get_valid_access_token(&self, id: ConnectionId) -> Option<String> {
        self.check_and_refresh_token_if_needed(id).await.access_token
    }

    /// Run `api_call` with a valid token. When it fails with a token error the
    /// connection is force-refreshed and the call retried, at most `max_retries` times.
    pub async fn handle_api_call_with_token_refresh<T, F, Fut>(
        &self,
        id: ConnectionId,
        mut api_call: F,
        max_retries: u32,
    ) -> Result<T, BoardError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, BoardError>>,
    {
        let initial = self.check_and_refresh_token_if_needed(id).await;
        let mut token = initial.into_token(id)?;

        let mut attempts = 0;
        loop {
            match api_call(token.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempts < max_retries && is_token_error(&e) => {
                    attempts += 1;
                    warn!(connection_id = id, error = %e, attempt = attempts, "token rejected, forcing refresh");
                    match self.force_refresh(id).await.into_token(id) {
                        Ok(fresh) => token = fresh,
                        Err(revoked @ BoardError::TokenRevoked(_)) => return Err(revoked),
                        Err(_) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn load(&self, id: ConnectionId) -> Result<DbConnection, RefreshResult> {
        match self.storage.get_connection(id).await {
            Ok(Some(conn)) => Ok(conn),
            Ok(None) => Err(RefreshResult::failed(format!("connection {id} not found"), false)),
            Err(e) => Err(RefreshResult::failed(e.to_string(), false)),
        }
    }

    async fn refresh_connection(&self, conn: &DbConnection) -> RefreshResult {
        let Some(platform) = Platform::parse(&conn.platform) else {
            return RefreshResult::failed(format!("unsupported platform {}", conn.platform), true);
        };
        let (access, refresh) = match (
            self.storage.decrypt_access_token(conn),
            self.storage.decrypt_refresh_token(conn),
        ) {
            (Ok(access), Ok(refresh)) => (access, refresh),
            (Err(e), _) | (_, Err(e)) => return RefreshResult::failed(e.to_string(), true),
        };

        self.limiter.until_ready().await;
        let grant = match self
            .platforms
            .refresh(platform, refresh.as_deref(), &access)
            .await
        {
            Ok(grant) => grant,
            Err(e) => {
                let permanent = matches!(e, BoardError::Oauth2Server { .. });
                warn!(connection_id = conn.id, %platform, error = %e, permanent, "token refresh failed");
                return RefreshResult::failed(e.to_string(), permanent);
            }
        };

        if let Err(e) = self
            .storage
            .update_tokens(
                conn.id,
                &grant.access_token,
                grant.refresh_token.as_deref(),
                grant.expires_at,
            )
            .await
        {
            warn!(connection_id = conn.id, error = %e, "failed to persist refreshed token");
            return RefreshResult::failed(e.to_string(), false);
        }

        info!(connection_id = conn.id, %platform, expires_at = ?grant.expires_at, "token refreshed");
        RefreshResult::ok(grant.access_token)
    }
}
