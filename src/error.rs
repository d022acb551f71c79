use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error as ThisError;

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(true);

/// Whether 500 responses carry a `details` field. Turned off in production.
pub fn expose_error_details(enabled: bool) {
    EXPOSE_DETAILS.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, ThisError)]
pub enum BoardError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    /// The platform refused the stored refresh credentials.
    #[error("Platform credentials revoked: {0}")]
    TokenRevoked(String),

    #[error("Upstream error with status: {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("Unexpected upstream payload: {0}")]
    UpstreamPayload(String),

    #[error("Token encryption error: {0}")]
    Crypto(String),

    #[error("Invalid session token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors worth another attempt after a short backoff.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for BoardError {
    fn is_retryable(&self) -> bool {
        match self {
            BoardError::Reqwest(e) => e.is_timeout() || e.is_connect(),
            BoardError::UpstreamStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for BoardError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => BoardError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                BoardError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => BoardError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => BoardError::Oauth2Token(s),
        }
    }
}

impl BoardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BoardError::BadRequest(_) | BoardError::UrlParse(_) => StatusCode::BAD_REQUEST,
            BoardError::Unauthorized(_) | BoardError::Jwt(_) => StatusCode::UNAUTHORIZED,
            BoardError::Forbidden(_) => StatusCode::FORBIDDEN,
            BoardError::NotFound(_) => StatusCode::NOT_FOUND,
            BoardError::Conflict(_) => StatusCode::CONFLICT,
            BoardError::OauthFlow(_)
            | BoardError::Oauth2Server { .. }
            | BoardError::Oauth2Token(_)
            | BoardError::TokenRevoked(_) => StatusCode::UNAUTHORIZED,
            BoardError::Reqwest(_)
            | BoardError::UpstreamStatus { .. }
            | BoardError::UpstreamPayload(_) => StatusCode::BAD_GATEWAY,
            BoardError::Json(_)
            | BoardError::Database(_)
            | BoardError::Crypto(_)
            | BoardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            BoardError::BadRequest(msg)
            | BoardError::Unauthorized(msg)
            | BoardError::Forbidden(msg)
            | BoardError::NotFound(msg)
            | BoardError::Conflict(msg) => msg.clone(),
            BoardError::Jwt(_) => "Invalid or expired session".to_string(),
            BoardError::UrlParse(_) => "Invalid URL".to_string(),
            BoardError::OauthFlow(_)
            | BoardError::Oauth2Server { .. }
            | BoardError::Oauth2Token(_) => "Authentication with platform failed".to_string(),
            BoardError::TokenRevoked(_) => {
                "Platform connection expired, please reconnect the account".to_string()
            }
            BoardError::Reqwest(_)
            | BoardError::UpstreamStatus { .. }
            | BoardError::UpstreamPayload(_) => "Upstream platform request failed".to_string(),
            BoardError::Json(_)
            | BoardError::Database(_)
            | BoardError::Crypto(_)
            | BoardError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let details = (status == StatusCode::INTERNAL_SERVER_ERROR
            && EXPOSE_DETAILS.load(Ordering::Relaxed))
        .then(|| self.to_string());
        let body = ApiErrorResponse {
            error: self.public_message(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
