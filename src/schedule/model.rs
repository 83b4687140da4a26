//! Payment schedule models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Status of a single scheduled period
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Partial,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    /// Rows a prepayment is allowed to rewrite
    pub fn is_recalculable(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Overdue)
    }
}

/// Persisted schedule row
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct PaymentSchedule {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub payment_number: i32,
    pub payment_date: NaiveDate,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
    pub total_amount: Decimal,
    pub remaining_balance: Decimal,
    pub status: PaymentStatus,
    pub actual_paid_amount: Decimal,
    pub late_fee: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A generated period, not yet persisted
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ScheduledPayment {
    pub payment_number: i32,
    pub payment_date: NaiveDate,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
    pub total_amount: Decimal,
    pub remaining_balance: Decimal,
    pub status: PaymentStatus,
    pub actual_paid_amount: Decimal,
    pub late_fee: Decimal,
}

/// A computed schedule with its totals, as returned by simulation
#[derive(Debug, Serialize, Clone)]
pub struct SimulatedSchedule {
    pub total_principal: Decimal,
    pub total_interest: Decimal,
    pub total_amount: Decimal,
    pub payments: Vec<ScheduledPayment>,
}

impl From<Vec<ScheduledPayment>> for SimulatedSchedule {
    fn from(payments: Vec<ScheduledPayment>) -> Self {
        let (total_principal, total_interest) = payments.iter().fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(principal, interest), p| (principal + p.principal_amount, interest + p.interest_amount),
        );
        Self {
            total_principal,
            total_interest,
            total_amount: total_principal + total_interest,
            payments,
        }
    }
}

/// Sort direction for schedule listings
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc", alias = "ASC")]
    Asc,
    #[serde(alias = "desc", alias = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Query parameters of `GET /api/loans/:id/schedule`
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleQuery {
    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub order: Option<SortOrder>,
}

impl ScheduleQuery {
    pub const MAX_TAKE: i64 = 600;

    pub fn offset(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.take.unwrap_or(Self::MAX_TAKE).clamp(1, Self::MAX_TAKE)
    }

    pub fn order(&self) -> SortOrder {
        self.order.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_query_defaults() {
        let query = ScheduleQuery::default();
        assert_eq!(query.offset(), 0);
        assert_eq!(query.limit(), ScheduleQuery::MAX_TAKE);
        assert_eq!(query.order(), SortOrder::Asc);
    }

    #[test]
    fn test_schedule_query_clamps() {
        let query = ScheduleQuery {
            skip: Some(-5),
            take: Some(10_000),
            order: Some(SortOrder::Desc),
        };
        assert_eq!(query.offset(), 0);
        assert_eq!(query.limit(), ScheduleQuery::MAX_TAKE);
        assert_eq!(query.order().as_sql(), "DESC");

        let query = ScheduleQuery {
            take: Some(0),
            ..Default::default()
        };
        assert_eq!(query.limit(), 1);
    }

    #[test]
    fn test_sort_order_accepts_both_cases() {
        let order: SortOrder = serde_json::from_str("\"desc\"").unwrap();
        assert_eq!(order, SortOrder::Desc);
        let order: SortOrder = serde_json::from_str("\"ASC\"").unwrap();
        assert_eq!(order, SortOrder::Asc);
    }

    #[test]
    fn test_recalculable_statuses() {
        assert!(PaymentStatus::Pending.is_recalculable());
        assert!(PaymentStatus::Overdue.is_recalculable());
        assert!(!PaymentStatus::Paid.is_recalculable());
        assert!(!PaymentStatus::Partial.is_recalculable());
        assert!(!PaymentStatus::Cancelled.is_recalculable());
    }
}
