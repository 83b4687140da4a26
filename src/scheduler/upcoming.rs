//! Daily scan for payments falling due tomorrow

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::loan::LoanEvent;
use crate::websocket::WsState;

/// A pending period due on the scanned day, with its loan context
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UpcomingPayment {
    pub schedule_id: Uuid,
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub loan_name: String,
    pub payment_number: i32,
    pub payment_date: NaiveDate,
    pub total_amount: Decimal,
}

/// Day whose payments are announced on `today`
pub fn tomorrow(today: NaiveDate) -> Option<NaiveDate> {
    today.checked_add_days(Days::new(1))
}

#[derive(Clone)]
pub struct UpcomingPaymentScanner {
    db_pool: PgPool,
    ws_state: WsState,
}

impl UpcomingPaymentScanner {
    pub fn new(db_pool: PgPool, ws_state: WsState) -> Self {
        Self { db_pool, ws_state }
    }

    /// Pending periods of live loans due the day after `today`
    pub async fn scan(&self, today: NaiveDate) -> Result<Vec<UpcomingPayment>, ApiError> {
        let due = tomorrow(today)
            .ok_or_else(|| ApiError::InternalError("Scan date is out of range".to_string()))?;

        let payments = sqlx::query_as::<_, UpcomingPayment>(
            r#"
            SELECT ps.id AS schedule_id, ps.loan_id, l.user_id, l.name AS loan_name,
                   ps.payment_number, ps.payment_date, ps.total_amount
            FROM payment_schedules ps
            JOIN loans l ON l.id = ps.loan_id
            WHERE ps.payment_date = $1
              AND ps.status = 'pending'
              AND l.deleted_at IS NULL
              AND l.is_active = TRUE
            ORDER BY ps.loan_id, ps.payment_number
            "#,
        )
        .bind(due)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(payments)
    }

    /// One scheduled run. Errors are logged here and never escape.
    pub async fn run_once(&self) {
        let today = Utc::now().date_naive();

        match self.scan(today).await {
            Ok(payments) if payments.is_empty() => {
                tracing::info!(date = %today, "No payments due tomorrow");
            }
            Ok(payments) => {
                tracing::info!(date = %today, count = payments.len(), "Payments due tomorrow");
                for payment in payments {
                    tracing::debug!(
                        loan_id = %payment.loan_id,
                        user_id = %payment.user_id,
                        payment_number = payment.payment_number,
                        amount = %payment.total_amount,
                        "Payment due notice"
                    );
                    self.ws_state
                        .broadcast_event(LoanEvent::PaymentDue { payment })
                        .await;
                }
            }
            Err(e) => {
                tracing::error!(date = %today, error = %e, "Upcoming payment scan failed");
            }
        }
    }
}
