//! Loan and schedule API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::loan::{
    CreateLoanRequest, ListLoansQuery, LoanEvent, LoanResponse, LoanService, RecordPaymentRequest,
    SimulateLoanRequest,
};
use crate::middleware::AuthenticatedUser;
use crate::models::{ApiResponse, PaginatedResponse};
use crate::schedule::{PaymentSchedule, ScheduleGenerator, ScheduleQuery, SimulatedSchedule};
use crate::websocket::WsState;

/// POST /api/loans - Create a loan and its payment schedule
pub async fn create_loan(
    State(service): State<LoanService>,
    State(ws_state): State<WsState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateLoanRequest>,
) -> Result<Json<ApiResponse<LoanResponse>>, ApiError> {
    let (loan, schedule) = service.create_loan(user.user_id, request).await?;

    ws_state
        .broadcast_event(LoanEvent::LoanCreated {
            loan_id: loan.id,
            user_id: loan.user_id,
            periods: schedule.len(),
        })
        .await;

    Ok(Json(ApiResponse::ok(loan.into())))
}

/// GET /api/loans - List the requester's loans
pub async fn list_loans(
    State(service): State<LoanService>,
    user: AuthenticatedUser,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<LoanResponse>>>, ApiError> {
    let loans = service.list_loans(user.user_id, query).await?;
    Ok(Json(ApiResponse::ok(loans)))
}

/// GET /api/loans/:id
pub async fn get_loan(
    State(service): State<LoanService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanResponse>>, ApiError> {
    let loan = service.get_loan(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(loan.into())))
}

/// DELETE /api/loans/:id - Soft delete
pub async fn delete_loan(
    State(service): State<LoanService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanResponse>>, ApiError> {
    let loan = service.delete_loan(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(loan.into())))
}

/// GET /api/loans/:id/schedule?skip&take&order
pub async fn get_schedule(
    State(service): State<LoanService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ApiResponse<Vec<PaymentSchedule>>>, ApiError> {
    let rows = service.get_schedule(id, user.user_id, query).await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// POST /api/loans/simulate - Compute a schedule without storing anything
pub async fn simulate_schedule(
    Json(request): Json<SimulateLoanRequest>,
) -> Result<Json<ApiResponse<SimulatedSchedule>>, ApiError> {
    let terms = request.to_terms()?;
    let payments = ScheduleGenerator::build(&terms)?;
    Ok(Json(ApiResponse::ok(payments.into())))
}

/// POST /api/loans/:id/schedule/:payment_number/pay
pub async fn record_payment(
    State(service): State<LoanService>,
    State(ws_state): State<WsState>,
    user: AuthenticatedUser,
    Path((id, payment_number)): Path<(Uuid, i32)>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentSchedule>>, ApiError> {
    let amount = request.amount;
    let row = service
        .record_payment(id, payment_number, user.user_id, request)
        .await?;

    ws_state
        .broadcast_event(LoanEvent::PaymentRecorded {
            loan_id: id,
            payment_number,
            amount,
        })
        .await;

    Ok(Json(ApiResponse::ok(row)))
}
