//! Analytics service for loan progress and snapshots

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{interest_breakdown, payment_history, LoanAnalytics, LoanProgress, ProgressAnalyzer};
use crate::error::ApiError;
use crate::loan::{fetch_schedule, find_loan, Loan};

#[derive(Clone)]
pub struct AnalyticsService {
    db_pool: PgPool,
}

impl AnalyticsService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn owned_loan(&self, loan_id: Uuid, requester: Uuid) -> Result<Loan, ApiError> {
        let loan = find_loan(&self.db_pool, loan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Loan", loan_id))?;
        loan.ensure_owner(requester)?;
        Ok(loan)
    }

    /// Current repayment progress of a loan
    pub async fn get_progress(&self, loan_id: Uuid, requester: Uuid) -> Result<LoanProgress, ApiError> {
        self.owned_loan(loan_id, requester).await?;
        let rows = fetch_schedule(&self.db_pool, loan_id).await?;
        Ok(ProgressAnalyzer::analyze(&rows))
    }

    /// Store a snapshot of the current progress
    pub async fn record_snapshot(
        &self,
        loan_id: Uuid,
        requester: Uuid,
    ) -> Result<LoanAnalytics, ApiError> {
        self.owned_loan(loan_id, requester).await?;
        let rows = fetch_schedule(&self.db_pool, loan_id).await?;
        let progress = ProgressAnalyzer::analyze(&rows);

        let snapshot = sqlx::query_as::<_, LoanAnalytics>(
            r#"
            INSERT INTO loan_analytics (
                loan_id, analysis_date, total_amount, paid_amount, remaining_amount,
                total_interest, paid_interest, progress_percentage, completed_payments,
                total_payments, payment_history, interest_breakdown
            )
            VALUES ($1, NOW(), $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(progress.total_amount)
        .bind(progress.paid_amount)
        .bind(progress.remaining_amount)
        .bind(progress.total_interest)
        .bind(progress.paid_interest)
        .bind(progress.progress_percentage)
        .bind(progress.completed_payments)
        .bind(progress.total_payments)
        .bind(Json(payment_history(&rows)))
        .bind(Json(interest_breakdown(&rows)))
        .fetch_one(&self.db_pool)
        .await?;

        tracing::debug!(
            loan_id = %loan_id,
            progress = %progress.progress_percentage,
            "Analytics snapshot recorded"
        );

        Ok(snapshot)
    }

    /// Snapshots of a loan, newest first
    pub async fn list_snapshots(
        &self,
        loan_id: Uuid,
        requester: Uuid,
    ) -> Result<Vec<LoanAnalytics>, ApiError> {
        self.owned_loan(loan_id, requester).await?;

        let snapshots = sqlx::query_as::<_, LoanAnalytics>(
            "SELECT * FROM loan_analytics WHERE loan_id = $1 ORDER BY analysis_date DESC",
        )
        .bind(loan_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(snapshots)
    }
}
