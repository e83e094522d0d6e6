// Route definitions for the CodeRed API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", post(handlers::run_code))
        .route("/submit", post(handlers::submit_code))
        .route("/submissions/:id", get(handlers::get_submission))
        .route("/users/:user_id/submissions", get(handlers::list_user_submissions))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
}
