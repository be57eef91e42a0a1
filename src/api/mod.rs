use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub mod handlers;
pub mod responses;

/// Shared context for the API side: the read-only view of the state plus the
/// broadcast cadence.
#[derive(Clone)]
pub struct ApiState {
    pub state: Arc<RwLock<AppState>>,
    pub tick: Duration,
}

pub fn router(state: Arc<RwLock<AppState>>, tick: Duration) -> Router {
    let context = ApiState { state, tick };
    Router::new()
        .route("/api/lot", get(handlers::get_lot))
        .route("/api/spots", get(handlers::get_spots))
        .route("/api/health", get(handlers::get_health))
        .route("/api/stream", get(handlers::get_stream))
        .with_state(context)
}
