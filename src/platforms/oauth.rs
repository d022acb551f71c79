use crate::config::ProviderConfig;
use crate::error::BoardError;
use crate::platforms::TokenGrant;

use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, RedirectUrl, RefreshToken, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Build an OAuth2 client for one platform from its provider settings.
pub(crate) fn build_oauth2_client(
    provider: &ProviderConfig,
    redirect_uri: &str,
) -> Result<PlatformOauth2Client, BoardError> {
    let client = OAuth2Client::new(ClientId::new(provider.client_id.clone()))
        .set_client_secret(ClientSecret::new(provider.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(provider.auth_url.clone())?)
        .set_token_uri(TokenUrl::new(provider.token_url.clone())?)
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);
    Ok(client)
}

/// Consent page URL with the provider's scopes and a fresh CSRF state.
pub(crate) fn authorize_url(
    client: &PlatformOauth2Client,
    provider: &ProviderConfig,
    extra_params: &[(&str, &str)],
) -> (Url, CsrfToken) {
    let mut req = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(provider.scopes.iter().cloned().map(Scope::new));
    for (name, value) in extra_params {
        req = req.add_extra_param(name.to_string(), value.to_string());
    }
    req.url()
}

/// Standard `authorization_code` grant.
pub(crate) async fn exchange_code(
    client: &PlatformOauth2Client,
    code: &str,
    http_client: &reqwest::Client,
) -> Result<TokenGrant, BoardError> {
    let token = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(http_client)
        .await?;
    Ok(grant_from_response(&token))
}

/// Standard `refresh_token` grant.
pub(crate) async fn exchange_refresh_token(
    client: &PlatformOauth2Client,
    refresh_token: &str,
    http_client: &reqwest::Client,
) -> Result<TokenGrant, BoardError> {
    let token = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(http_client)
        .await?;
    Ok(grant_from_response(&token))
}

fn grant_from_response(token: &PlatformTokenResponse) -> TokenGrant {
    TokenGrant::expiring_in(
        token.access_token().secret().clone(),
        token.refresh_token().map(|r| r.secret().clone()),
        token.expires_in().and_then(|d| i64::try_from(d.as_secs()).ok()),
    )
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct PlatformTokenFields {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for PlatformTokenFields {}

pub(crate) type PlatformTokenResponse = StandardTokenResponse<PlatformTokenFields, BasicTokenType>;

pub(crate) type PlatformOauth2Client = OAuth2Client<
    BasicErrorResponse,
    PlatformTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
