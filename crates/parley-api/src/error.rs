use axum::http::StatusCode;
use tokio::task::JoinError;
use tracing::{error, warn};

use parley_db::StoreError;

/// Map a store failure onto the HTTP status reported to the client.
pub fn status_for(e: StoreError) -> StatusCode {
    match e {
        StoreError::Validation(msg) => {
            warn!("Rejected request: {}", msg);
            StatusCode::BAD_REQUEST
        }
        StoreError::NotFound(msg) => {
            warn!("Not found: {}", msg);
            StatusCode::NOT_FOUND
        }
        StoreError::Persistence(msg) => {
            error!("Storage failure: {}", msg);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn join_error(e: JoinError) -> StatusCode {
    error!("spawn_blocking join error: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}
