use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_db::MessageStore;
use parley_types::api::MessageResponse;

use crate::error::{join_error, status_for};
use crate::state::AppState;

/// Conversation history between two users, oldest first.
/// Unknown user ids simply have no history.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path((user_id, other_user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, StatusCode> {
    let store = state.store.clone();
    let rows = tokio::task::spawn_blocking(move || store.get_conversation(user_id, other_user_id))
        .await
        .map_err(join_error)?
        .map_err(status_for)?;

    let messages: Vec<MessageResponse> = rows.into_iter().map(MessageResponse::from).collect();
    Ok(Json(messages))
}
