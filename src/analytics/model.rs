//! Loan analytics snapshot models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::schedule::{PaymentSchedule, PaymentStatus};

/// One period that has received money
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    pub payment_number: i32,
    pub payment_date: NaiveDate,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Interest of one period and whether it has been collected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodInterest {
    pub payment_number: i32,
    pub payment_date: NaiveDate,
    pub interest_amount: Decimal,
    pub status: PaymentStatus,
    /// Interest of a PAID period counts as collected, any other status as outstanding
    pub paid: bool,
}

/// Persisted analytics snapshot
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LoanAnalytics {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub analysis_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub total_interest: Decimal,
    pub paid_interest: Decimal,
    pub progress_percentage: Decimal,
    pub completed_payments: i32,
    pub total_payments: i32,
    pub payment_history: Json<Vec<PaymentHistoryEntry>>,
    pub interest_breakdown: Json<Vec<PeriodInterest>>,
}

/// Periods with any money received, in payment order
pub fn payment_history(rows: &[PaymentSchedule]) -> Vec<PaymentHistoryEntry> {
    rows.iter()
        .filter(|row| !row.actual_paid_amount.is_zero())
        .map(|row| PaymentHistoryEntry {
            payment_number: row.payment_number,
            payment_date: row.payment_date,
            amount_due: row.total_amount + row.late_fee,
            amount_paid: row.actual_paid_amount,
            status: row.status,
            paid_at: row.paid_at,
        })
        .collect()
}

/// Interest of every period in payment order. Cancelled periods are left out.
pub fn interest_breakdown(rows: &[PaymentSchedule]) -> Vec<PeriodInterest> {
    rows.iter()
        .filter(|row| row.status != PaymentStatus::Cancelled)
        .map(|row| PeriodInterest {
            payment_number: row.payment_number,
            payment_date: row.payment_date,
            interest_amount: row.interest_amount,
            status: row.status,
            paid: row.status == PaymentStatus::Paid,
        })
        .collect()
}
