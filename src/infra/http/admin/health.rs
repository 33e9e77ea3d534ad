use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AdminState;

pub(super) async fn admin_health(State(state): State<AdminState>) -> Response {
    // Takes the store read lock.
    let _ = state.cache.len();
    StatusCode::NO_CONTENT.into_response()
}
