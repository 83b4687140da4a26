//! Loan route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans", get(list_loans).post(create_loan))
        .route("/api/loans/simulate", post(simulate_schedule))
        .route("/api/loans/:id", get(get_loan).delete(delete_loan))
        .route("/api/loans/:id/schedule", get(get_schedule))
        .route(
            "/api/loans/:id/schedule/:payment_number/pay",
            post(record_payment),
        )
}
