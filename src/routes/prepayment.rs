//! Prepayment route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn prepayment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/loans/:id/prepayments",
            get(list_prepayments).post(create_prepayment),
        )
        .route("/api/loans/prepayments/:id", get(get_prepayment))
        .route("/api/loans/prepayments/:id/apply", post(apply_prepayment))
        .route("/api/loans/prepayments/:id/cancel", post(cancel_prepayment))
        .route(
            "/api/loans/prepayments/:id/schedule",
            get(get_prepayment_schedule),
        )
}
