pub mod config;
pub mod error;
pub mod feedback;
pub mod filters;
pub mod handlers;
pub mod images;
pub mod mail;
pub mod retry;
pub mod session;
pub mod state;
pub mod store;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use state::AppState;

/// Directory served under `/static`
pub const STATIC_DIR: &str = "static";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/load", post(handlers::load_questions))
        .route("/answers", post(handlers::save_answers))
        .route("/feedback", post(handlers::request_feedback))
        .route("/submit", post(handlers::submit_answers))
        .route("/health", get(handlers::health))
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
