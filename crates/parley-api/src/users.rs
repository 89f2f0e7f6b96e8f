use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use parley_db::MessageStore;
use parley_types::api::{RegisterRequest, UserResponse};

use crate::error::{join_error, status_for};
use crate::state::AppState;

/// Register a username. Idempotent: an existing username returns its user.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let user = tokio::task::spawn_blocking(move || store.create_or_get_user(&req.username))
        .await
        .map_err(join_error)?
        .map_err(status_for)?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let users = tokio::task::spawn_blocking(move || store.list_users())
        .await
        .map_err(join_error)?
        .map_err(status_for)?;

    let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(users))
}
