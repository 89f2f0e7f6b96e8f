pub mod error;
pub mod messages;
pub mod state;
pub mod users;

use axum::{Router, routing::get};

use crate::state::AppState;

/// REST routes for registration, user listing, and conversation history.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(users::list_users).post(users::register))
        .route("/users/", get(users::list_users).post(users::register))
        .route(
            "/messages/{user_id}/{other_user_id}",
            get(messages::get_conversation),
        )
        .with_state(state)
}
