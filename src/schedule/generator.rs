//! Schedule generation: amortization rows plus payment dates

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder, Transaction};

use super::{PaymentSchedule, PaymentStatus, ScheduledPayment};
use crate::amortization;
use crate::error::ApiError;
use crate::loan::{Loan, LoanTerms};

/// Due date of the period `months_ahead` months after `start_date`.
///
/// The day is `payment_day`, clamped to the last day of the target month
/// (a 31st anchor falls on the 30th in a 30-day month, never in the next month).
pub fn payment_date(start_date: NaiveDate, payment_day: u32, months_ahead: u32) -> Option<NaiveDate> {
    let first_of_month = start_date.with_day(1)?;
    let target_month = first_of_month.checked_add_months(Months::new(months_ahead))?;
    let last_day = target_month
        .checked_add_months(Months::new(1))?
        .pred_opt()?
        .day();

    target_month.with_day(payment_day.clamp(1, last_day))
}

/// Builds and persists the full repayment plan of a loan
pub struct ScheduleGenerator;

impl ScheduleGenerator {
    /// Compute every period of the plan without touching storage
    pub fn build(terms: &LoanTerms) -> Result<Vec<ScheduledPayment>, ApiError> {
        let installments = amortization::amortize(
            terms.repayment_type,
            terms.amount,
            terms.monthly_rate(),
            terms.term,
        )?;

        installments
            .into_iter()
            .map(|row| {
                let due = payment_date(terms.start_date, terms.payment_day, row.period)
                    .ok_or_else(|| {
                        ApiError::ValidationError(format!(
                            "Payment date of period {} is out of range",
                            row.period
                        ))
                    })?;

                Ok(ScheduledPayment {
                    payment_number: row.period as i32,
                    payment_date: due,
                    principal_amount: row.principal,
                    interest_amount: row.interest,
                    total_amount: row.total,
                    remaining_balance: row.remaining_balance,
                    status: PaymentStatus::Pending,
                    actual_paid_amount: Decimal::ZERO,
                    late_fee: Decimal::ZERO,
                })
            })
            .collect()
    }

    /// Insert the plan of a freshly inserted loan and activate it.
    ///
    /// Runs on the caller's transaction; the caller commits. Returns the
    /// activated loan and the persisted rows ordered by payment number.
    pub async fn generate(
        tx: &mut Transaction<'_, Postgres>,
        loan: &Loan,
    ) -> Result<(Loan, Vec<PaymentSchedule>), ApiError> {
        let rows = Self::build(&loan.terms())?;

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            INSERT INTO payment_schedules (
                loan_id, payment_number, payment_date, principal_amount, interest_amount,
                total_amount, remaining_balance, status, actual_paid_amount, late_fee
            )
            "#,
        );
        query_builder.push_values(rows.iter(), |mut b, row| {
            b.push_bind(loan.id)
                .push_bind(row.payment_number)
                .push_bind(row.payment_date)
                .push_bind(row.principal_amount)
                .push_bind(row.interest_amount)
                .push_bind(row.total_amount)
                .push_bind(row.remaining_balance)
                .push_bind(row.status)
                .push_bind(row.actual_paid_amount)
                .push_bind(row.late_fee);
        });
        query_builder.push(" RETURNING *");

        let mut persisted = query_builder
            .build_query_as::<PaymentSchedule>()
            .fetch_all(&mut **tx)
            .await?;
        persisted.sort_by_key(|row| row.payment_number);

        if persisted.len() != rows.len() {
            return Err(ApiError::InternalError(format!(
                "Expected {} schedule rows for loan {}, stored {}",
                rows.len(),
                loan.id,
                persisted.len()
            )));
        }

        let activated = sqlx::query_as::<_, Loan>(
            "UPDATE loans SET is_active = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(loan.id)
        .fetch_one(&mut **tx)
        .await?;

        tracing::info!(
            loan_id = %loan.id,
            periods = persisted.len(),
            repayment_type = %loan.repayment_type,
            "Payment schedule generated"
        );

        Ok((activated, persisted))
    }
}
