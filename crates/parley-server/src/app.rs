use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::error::{join_error, status_for};
use parley_api::state::AppStateInner;
use parley_db::MessageStore;
use parley_gateway::connection::{self, ConnectionSettings};
use parley_gateway::registry::Registry;
use parley_gateway::relay::Relay;

#[derive(Clone)]
pub struct ServerState {
    pub relay: Relay,
    pub connection: ConnectionSettings,
}

impl ServerState {
    pub fn new(store: Arc<dyn MessageStore>, connection: ConnectionSettings) -> Self {
        Self {
            relay: Relay::new(store, Registry::new()),
            connection,
        }
    }

    pub fn registry(&self) -> &Registry {
        self.relay.registry()
    }
}

/// Assemble the REST routes and the WebSocket gateway.
pub fn build_router(state: ServerState) -> Router {
    let store = state.relay.store().clone();

    let ws_route = Router::new()
        .route("/ws/{user_id}", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(parley_api::router(AppStateInner::new(store)))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Path(user_id): Path<i64>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.relay.store().clone();
    let user = tokio::task::spawn_blocking(move || store.get_user(user_id))
        .await
        .map_err(join_error)?
        .map_err(status_for)?;

    let Some(user) = user else {
        info!("Rejected WebSocket for unknown user {}", user_id);
        return Err(StatusCode::NOT_FOUND);
    };

    info!("Upgrading WebSocket for {} ({})", user.username, user.id);
    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.relay, user_id, state.connection)
    }))
}
