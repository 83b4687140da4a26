//! Analytics route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans/:id/progress", get(get_progress))
        .route(
            "/api/loans/:id/analytics",
            post(record_analytics).get(list_analytics),
        )
}
