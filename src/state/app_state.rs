//! Application state shared across handlers

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::analytics::AnalyticsService;
use crate::auth::JwtKeys;
use crate::loan::LoanService;
use crate::prepayment::PrepaymentService;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub loan_service: LoanService,
    pub prepayment_service: PrepaymentService,
    pub analytics_service: AnalyticsService,
    pub ws_state: WsState,
    pub jwt_keys: JwtKeys,
    pub db_pool: PgPool,
}

impl AppState {
    /// Build every service on top of one pool
    pub fn new(db_pool: PgPool, ws_state: WsState, jwt_keys: JwtKeys) -> Self {
        Self {
            loan_service: LoanService::new(db_pool.clone()),
            prepayment_service: PrepaymentService::new(db_pool.clone()),
            analytics_service: AnalyticsService::new(db_pool.clone()),
            ws_state,
            jwt_keys,
            db_pool,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt_keys.clone()
    }
}

impl FromRef<AppState> for LoanService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for PrepaymentService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.prepayment_service.clone()
    }
}

impl FromRef<AppState> for AnalyticsService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.analytics_service.clone()
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
