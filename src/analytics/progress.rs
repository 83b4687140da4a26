//! Repayment progress aggregation over a loan's schedule

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::schedule::{PaymentSchedule, PaymentStatus};

/// Aggregated repayment progress of one loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanProgress {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    /// Percent of the scheduled total already paid, two decimals
    pub progress_percentage: Decimal,
    pub completed_payments: i32,
    pub total_payments: i32,
    pub total_interest: Decimal,
    pub paid_interest: Decimal,
    /// Principal of periods that are neither paid nor cancelled
    pub remaining_principal: Decimal,
}

pub struct ProgressAnalyzer;

impl ProgressAnalyzer {
    /// Summarize a schedule. Read-only; the same rows always give the same result.
    pub fn analyze(rows: &[PaymentSchedule]) -> LoanProgress {
        let mut progress = LoanProgress {
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            progress_percentage: Decimal::ZERO,
            completed_payments: 0,
            total_payments: rows.len() as i32,
            total_interest: Decimal::ZERO,
            paid_interest: Decimal::ZERO,
            remaining_principal: Decimal::ZERO,
        };

        for row in rows {
            progress.total_amount += row.total_amount;
            progress.paid_amount += row.actual_paid_amount;
            progress.total_interest += row.interest_amount;

            match row.status {
                PaymentStatus::Paid => {
                    progress.completed_payments += 1;
                    progress.paid_interest += row.interest_amount;
                }
                PaymentStatus::Cancelled => {}
                PaymentStatus::Pending | PaymentStatus::Partial | PaymentStatus::Overdue => {
                    progress.remaining_principal += row.principal_amount;
                }
            }
        }

        progress.remaining_amount = progress.total_amount - progress.paid_amount;
        progress.progress_percentage = percentage(progress.paid_amount, progress.total_amount);
        progress
    }
}

fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part / whole * dec!(100)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
