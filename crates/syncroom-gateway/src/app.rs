use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use syncroom_core::config::SyncroomConfig;
use syncroom_ephemeral::EphemeralStore;
use syncroom_rooms::RoomHubManager;
use syncroom_store::DocumentStore;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::auth::IdentityVerifier;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: SyncroomConfig,
    pub rooms: RoomHubManager,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: SyncroomConfig,
        store: Arc<DocumentStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let rooms = RoomHubManager::new(
            store,
            Arc::new(EphemeralStore::new()),
            config.limits.clone(),
        );
        Self {
            config,
            rooms,
            verifier,
            started_at: Instant::now(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.gateway.frontend_origin);
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
}

/// Origin allowlist for the upgrade handshake. "*" opens it up; anything
/// else must parse as a single origin.
fn cors_layer(frontend_origin: &str) -> CorsLayer {
    if frontend_origin == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    match frontend_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(frontend_origin, "invalid frontend_origin, denying cross-origin requests");
            CorsLayer::new()
        }
    }
}
