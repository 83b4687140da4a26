//! Route definitions

mod analytics;
mod loan;
mod prepayment;

pub use analytics::analytics_routes;
pub use loan::loan_routes;
pub use prepayment::prepayment_routes;

use axum::{routing::get, Router};

use crate::handlers::{health_check, root};
use crate::state::AppState;
use crate::websocket;

/// Every route of the service, bound to its state. Layers are added by the caller.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(loan_routes())
        .merge(prepayment_routes())
        .merge(analytics_routes())
        .with_state(state)
}
