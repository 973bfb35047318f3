//! Broadcast relay: axum server that receives closest-aircraft payloads and
//! fans them out to websocket clients.
//!
//! Shared state is the latest payload plus a broadcast channel of serialized
//! updates; each websocket client subscribes on connect.

use std::sync::Arc;

use axum::Router;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};

pub mod pages;
pub mod routes;

/// Buffered updates per websocket client before it starts lagging.
const UPDATE_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct RelayState {
    pub latest: RwLock<Value>,
    pub updates: broadcast::Sender<String>,
}

impl RelayState {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        RelayState {
            latest: RwLock::new(Value::Object(Default::default())),
            updates,
        }
    }
}

impl Default for RelayState {
    fn default() -> Self {
        RelayState::new()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<RelayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", axum::routing::get(pages::page_index))
        .route("/update", axum::routing::post(routes::api_update))
        .route("/latest", axum::routing::get(routes::api_latest))
        .route("/ws", axum::routing::get(routes::ws_handler))
        .with_state(state)
        .layer(cors)
}

/// Start the relay server.
pub async fn serve(host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(Arc::new(RelayState::new()));
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("planeradar relay listening on http://{addr}");
    axum::serve(listener, app).await
}
