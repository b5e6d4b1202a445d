use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/kpis", get(handlers::get_kpis))
        .route("/api/today", get(handlers::get_today))
        .route("/api/refresh", post(handlers::refresh))
        .with_state(state)
}
