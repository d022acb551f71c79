//! Platform login and account linking.

use crate::db::models::{ConnectionId, Creator, CreatorId, NewConnection};
use crate::db::BoardStorage;
use crate::error::BoardError;
use crate::platforms::{Platform, PlatformClient};
use tracing::info;

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub creator: Creator,
    pub connection_id: ConnectionId,
    /// A new creator was registered by this login.
    pub created: bool,
}

#[derive(Clone)]
pub struct ConnectionService {
    storage: BoardStorage,
    platforms: PlatformClient,
    frontend_url: String,
}

impl ConnectionService {
    pub fn new(storage: BoardStorage, platforms: PlatformClient, frontend_url: String) -> Self {
        Self {
            storage,
            platforms,
            frontend_url,
        }
    }

    /// Complete an OAuth callback.
    ///
    /// With `link_to` the platform account is attached to that creator.
    /// Otherwise a returning account logs into its creator and an unknown
    /// account registers a new one.
    pub async fn handle_callback(
        &self,
        platform: Platform,
        code: &str,
        link_to: Option<CreatorId>,
    ) -> Result<LoginOutcome, BoardError> {
        let grant = self.platforms.exchange_code(platform, code).await?;
        let identity = self
            .platforms
            .fetch_identity(platform, &grant.access_token)
            .await?;

        let existing = self
            .storage
            .find_connection_by_platform_user(platform.as_str(), &identity.id)
            .await?;

        let (creator, created) = match (link_to, existing.as_ref()) {
            (Some(id), Some(conn)) if conn.creator_id != id => {
                return Err(BoardError::Conflict(format!(
                    "This {} account is already linked to another creator",
                    platform.display_name()
                )));
            }
            (Some(id), _) => (self.storage.require_creator(id).await?, false),
            (None, Some(conn)) => (self.storage.require_creator(conn.creator_id).await?, false),
            (None, None) => {
                let name = if identity.display_name.trim().is_empty() {
                    identity.username.clone().unwrap_or_else(|| identity.id.clone())
                } else {
                    identity.display_name.clone()
                };
                (self.storage.create_creator(&name, &self.frontend_url).await?, true)
            }
        };

        let connection_id = self
            .storage
            .upsert_connection(NewConnection {
                creator_id: creator.id,
                platform: platform.as_str().to_string(),
                platform_user_id: identity.id,
                platform_username: identity.username.or(Some(identity.display_name)),
                access_token: grant.access_token,
                refresh_token: grant.refresh_token,
                token_expiry: grant.expires_at,
            })
            .await?;

        info!(
            creator_id = creator.id,
            connection_id,
            %platform,
            created,
            "platform account connected"
        );
        Ok(LoginOutcome {
            creator,
            connection_id,
            created,
        })
    }
}
