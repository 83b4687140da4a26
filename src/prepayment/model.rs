//! Prepayment models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Kind of prepayment
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "prepayment_type", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrepaymentType {
    /// Reduces the balance, remaining periods are recalculated
    Partial,
    /// Settles the whole remaining balance
    Full,
}

/// Prepayment status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "prepayment_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrepaymentStatus {
    Pending,
    Applied,
    Cancelled,
    Rejected,
}

/// Prepayment model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Prepayment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub prepayment_type: PrepaymentType,
    pub prepayment_date: NaiveDate,
    pub status: PrepaymentStatus,
    pub interest_savings: Decimal,
    pub principal_reduction: Decimal,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Before/after snapshot of one period rewritten by a prepayment
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct PrepaymentSchedule {
    pub id: Uuid,
    pub prepayment_id: Uuid,
    pub payment_schedule_id: Uuid,
    pub payment_number: i32,
    pub original_principal: Decimal,
    pub original_interest: Decimal,
    pub original_total: Decimal,
    pub new_principal: Decimal,
    pub new_interest: Decimal,
    pub new_total: Decimal,
    pub new_remaining_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Request to register a prepayment against a loan
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrepaymentRequest {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub prepayment_type: PrepaymentType,
    pub prepayment_date: NaiveDate,
}

/// New amounts of one period after recalculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalculatedPeriod {
    pub schedule_id: Uuid,
    pub payment_number: i32,
    pub original_principal: Decimal,
    pub original_interest: Decimal,
    pub original_total: Decimal,
    pub new_principal: Decimal,
    pub new_interest: Decimal,
    pub new_total: Decimal,
    pub new_remaining_balance: Decimal,
}

impl RecalculatedPeriod {
    /// Interest no longer owed on this period
    pub fn interest_saved(&self) -> Decimal {
        self.original_interest - self.new_interest
    }
}
