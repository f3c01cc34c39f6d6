pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::autofill::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Autofill API
        .route("/api/v1/autofill/plan", post(handlers::handle_generate_plan))
        .route("/api/v1/autofill/runs/:id", get(handlers::handle_get_run))
        .route(
            "/api/v1/autofill/feedback",
            post(handlers::handle_feedback),
        )
        .with_state(state)
}
