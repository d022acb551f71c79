//! Session tokens and the extractors that resolve the calling creator.
//!
//! A session is an HS256 JWT whose `sub` is the creator id. It is accepted
//! from `Authorization: Bearer <jwt>` or from the session cookie.

use crate::db::models::{Creator, CreatorId};
use crate::error::BoardError;
use crate::router::BoardState;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    cookie_name: String,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64, cookie_name: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.max(1)),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, creator_id: CreatorId) -> Result<String, BoardError> {
        let now = Utc::now();
        let claims = Claims {
            sub: creator_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, BoardError> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }

    /// Bearer header first, then the session cookie.
    pub fn token_from_parts(&self, parts: &Parts) -> Option<String> {
        if let Some(auth) = parts.headers.typed_get::<Authorization<Bearer>>()
            && !auth.token().trim().is_empty()
        {
            return Some(auth.token().trim().to_string());
        }
        CookieJar::from_headers(&parts.headers)
            .get(&self.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}

async fn resolve_creator(parts: &Parts, state: &BoardState) -> Result<Creator, BoardError> {
    let token = state
        .sessions
        .token_from_parts(parts)
        .ok_or_else(|| BoardError::Unauthorized("Authentication required".to_string()))?;
    let claims = state.sessions.verify(&token)?;
    let id: CreatorId = claims
        .sub
        .parse()
        .map_err(|_| BoardError::Unauthorized("Malformed session subject".to_string()))?;
    state
        .storage
        .get_creator(id)
        .await?
        .ok_or_else(|| BoardError::Unauthorized("Creator no longer exists".to_string()))
}

/// The authenticated creator.
#[derive(Debug, Clone)]
pub struct CurrentCreator(pub Creator);

impl<S> FromRequestParts<S> for CurrentCreator
where
    BoardState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = BoardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = BoardState::from_ref(state);
        resolve_creator(parts, &state).await.map(Self)
    }
}

/// The authenticated creator, if the request carries a valid session.
#[derive(Debug, Clone)]
pub struct MaybeCreator(pub Option<Creator>);

impl<S> FromRequestParts<S> for MaybeCreator
where
    BoardState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = BoardState::from_ref(state);
        Ok(Self(resolve_creator(parts, &state).await.ok()))
    }
}

/// An authenticated creator with the super-admin flag.
#[derive(Debug, Clone)]
pub struct SuperAdmin(pub Creator);

impl<S> FromRequestParts<S> for SuperAdmin
where
    BoardState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = BoardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = BoardState::from_ref(state);
        let creator = resolve_creator(parts, &state).await?;
        if !creator.is_super_admin {
            return Err(BoardError::Forbidden("Super admin access required".to_string()));
        }
        Ok(Self(creator))
    }
}
