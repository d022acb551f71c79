use crate::config::Config;
use crate::db::BoardStorage;
use crate::handlers::{admin, auth, content, health, leaderboard};
use crate::middleware::{SessionKeys, cors_layer};
use crate::platforms::PlatformClient;
use crate::service::{ConnectionService, SubmissionService, SyncService, TokenRefreshService};
use axum::{
    Router,
    extract::FromRef,
    routing::{get, patch, post},
};
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Shared handles for every request.
#[derive(Clone)]
pub struct BoardState {
    pub config: Arc<Config>,
    pub storage: BoardStorage,
    pub platforms: PlatformClient,
    pub tokens: TokenRefreshService,
    pub sync: SyncService,
    pub submissions: SubmissionService,
    pub connections: ConnectionService,
    pub sessions: SessionKeys,
    key: Key,
}

impl BoardState {
    pub fn new(config: Arc<Config>, storage: BoardStorage, http: reqwest::Client) -> Self {
        let platforms = PlatformClient::new(&config, http);
        let tokens = TokenRefreshService::new(storage.clone(), platforms.clone(), &config.tokens);
        let sync = SyncService::new(
            storage.clone(),
            platforms.clone(),
            tokens.clone(),
            config.sync.clone(),
            config.scoring.clone(),
        );
        let submissions = SubmissionService::new(
            storage.clone(),
            platforms.clone(),
            tokens.clone(),
            config.scoring.clone(),
        );
        let connections = ConnectionService::new(
            storage.clone(),
            platforms.clone(),
            config.basic.frontend_url.clone(),
        );
        let sessions = SessionKeys::new(
            &config.auth.jwt_secret,
            config.auth.jwt_ttl_hours,
            config.auth.cookie_name.clone(),
        );
        // Key::from needs 64 bytes of material
        let key = Key::from(Sha512::digest(config.auth.cookie_secret.as_bytes()).as_slice());

        Self {
            config,
            storage,
            platforms,
            tokens,
            sync,
            submissions,
            connections,
            sessions,
            key,
        }
    }
}

impl FromRef<BoardState> for Key {
    fn from_ref(state: &BoardState) -> Self {
        state.key.clone()
    }
}

pub fn board_router(state: BoardState) -> Router {
    let body_limit = state.config.basic.body_limit_kb.max(1) * 1024;
    let cors = cors_layer(&state.config.basic.cors_origins);

    let auth_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/{platform}", get(auth::auth_entry))
        .route("/{platform}/callback", get(auth::auth_callback));

    let content_routes = Router::new()
        .route("/", get(content::list_content))
        .route("/submit", post(content::submit_content))
        .route(
            "/{id}",
            get(content::get_content).delete(content::delete_content),
        );

    let admin_routes = Router::new()
        .route("/creators/search", get(admin::search_creators))
        .route("/creators/{id}", patch(admin::update_creator))
        .route("/content/submit", post(admin::submit_content))
        .route("/content/{id}/status", patch(admin::set_content_status))
        .route("/sync", post(admin::trigger_sync));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/content", content_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/leaderboard/creators", get(leaderboard::creators))
        .route("/api/health", get(health::health))
        .route("/api/debug/connections", get(admin::debug_connections))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
