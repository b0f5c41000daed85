use axum::Router;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/lock/{row_id}", post(handlers::rows::lock_row_handler))
        .route(
            "/lock/{row_id}/renew",
            post(handlers::rows::renew_row_lock_handler),
        )
        .route("/unlock/{row_id}", post(handlers::rows::unlock_row_handler))
        .route("/update/{row_id}", put(handlers::rows::update_row_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
