use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

mod app;
mod auth;
mod http;
mod ws;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncroom_gateway=info,syncroom_rooms=info,tower_http=debug".into()),
        )
        .init();

    // Exit 1 on fatal configuration or an unreachable store at startup.
    if let Err(e) = run().await {
        error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // load config: SYNCROOM_CONFIG path > ~/.syncroom/syncroom.toml > defaults
    let config_path = std::env::var("SYNCROOM_CONFIG").ok();
    let explicit = config_path.is_some();
    let config = match syncroom_core::config::SyncroomConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) if explicit => return Err(e.into()),
        Err(e) => {
            tracing::warn!("config load failed ({}), using defaults", e);
            syncroom_core::config::SyncroomConfig::default()
        }
    };

    let store = Arc::new(syncroom_store::DocumentStore::open(&config.database.path)?);
    let verifier = Arc::new(auth::HmacTokenVerifier::new(&config.gateway.auth_secret));

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState::new(config, store, verifier));
    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("syncroom gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    state.rooms.shutdown_all().await;
    Ok(())
}
