use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = creatorboard::config::Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        environment = %cfg.basic.environment,
        public_url = %cfg.basic.public_url,
        proxy = %cfg.http.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        sync_enabled = cfg.sync.enabled,
        loglevel = %cfg.basic.loglevel,
    );
    let default_secrets = cfg.default_secrets();
    if !default_secrets.is_empty() {
        warn!(secrets = ?default_secrets, "running with placeholder secrets");
    }
    creatorboard::error::expose_error_details(!cfg.is_production());

    let cipher = creatorboard::TokenCipher::new(&cfg.auth.encryption_key);
    let storage = creatorboard::db::connect(&cfg.basic.database_url, cipher).await?;
    let http = creatorboard::platforms::http::build_http_client(&cfg.http)?;

    let cfg = Arc::new(cfg);
    let state = creatorboard::BoardState::new(cfg.clone(), storage.clone(), http);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = cfg
        .sync
        .enabled
        .then(|| state.sync.clone().spawn(shutdown_rx));

    let app = creatorboard::board_router(state);

    let addr = cfg.basic.listen_addr.as_str();
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler
        && let Err(e) = handle.await
    {
        warn!(error = %e, "sync scheduler ended abnormally");
    }
    storage.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
