//! Axum router wiring.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport::http};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/authorize", post(http::authorize))
        .route("/v1/resolve", get(http::resolve))
        .route("/v1/flows", post(http::register_flow))
        .route("/v1/admin/reload", post(http::reload))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
