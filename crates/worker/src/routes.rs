//! Route table.

use axum::routing::{get, post};
use axum::Router;

use crate::handler;
use crate::state::AppState;

/// Build the worker's router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handler::health))
        .route("/run", post(handler::run))
        .with_state(state)
}
