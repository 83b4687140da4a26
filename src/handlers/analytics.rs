//! Progress and analytics handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::analytics::{AnalyticsService, LoanAnalytics, LoanProgress};
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;

/// GET /api/loans/:id/progress
pub async fn get_progress(
    State(service): State<AnalyticsService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanProgress>>, ApiError> {
    let progress = service.get_progress(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(progress)))
}

/// POST /api/loans/:id/analytics - Record a snapshot
pub async fn record_analytics(
    State(service): State<AnalyticsService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LoanAnalytics>>, ApiError> {
    let snapshot = service.record_snapshot(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

/// GET /api/loans/:id/analytics
pub async fn list_analytics(
    State(service): State<AnalyticsService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<LoanAnalytics>>>, ApiError> {
    let snapshots = service.list_snapshots(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(snapshots)))
}
