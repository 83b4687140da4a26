//! Prepayment API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::loan::LoanEvent;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::prepayment::{CreatePrepaymentRequest, Prepayment, PrepaymentSchedule, PrepaymentService};
use crate::websocket::WsState;

/// POST /api/loans/:id/prepayments - Register a pending prepayment
pub async fn create_prepayment(
    State(service): State<PrepaymentService>,
    user: AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<CreatePrepaymentRequest>,
) -> Result<Json<ApiResponse<Prepayment>>, ApiError> {
    let prepayment = service
        .create_prepayment(loan_id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(prepayment)))
}

/// GET /api/loans/:id/prepayments
pub async fn list_prepayments(
    State(service): State<PrepaymentService>,
    user: AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Prepayment>>>, ApiError> {
    let prepayments = service.list_prepayments(loan_id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(prepayments)))
}

/// GET /api/loans/prepayments/:id
pub async fn get_prepayment(
    State(service): State<PrepaymentService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Prepayment>>, ApiError> {
    let prepayment = service.get_prepayment(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(prepayment)))
}

/// POST /api/loans/prepayments/:id/apply - Apply and recalculate the schedule
pub async fn apply_prepayment(
    State(service): State<PrepaymentService>,
    State(ws_state): State<WsState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Prepayment>>, ApiError> {
    let prepayment = service.apply_prepayment(id, user.user_id).await?;

    ws_state
        .broadcast_event(LoanEvent::PrepaymentApplied {
            loan_id: prepayment.loan_id,
            prepayment_id: prepayment.id,
            interest_savings: prepayment.interest_savings,
        })
        .await;

    Ok(Json(ApiResponse::ok(prepayment)))
}

/// POST /api/loans/prepayments/:id/cancel
pub async fn cancel_prepayment(
    State(service): State<PrepaymentService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Prepayment>>, ApiError> {
    let prepayment = service.cancel_prepayment(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(prepayment)))
}

/// GET /api/loans/prepayments/:id/schedule - Apply-time snapshots
pub async fn get_prepayment_schedule(
    State(service): State<PrepaymentService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PrepaymentSchedule>>>, ApiError> {
    let snapshots = service.get_snapshots(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(snapshots)))
}
