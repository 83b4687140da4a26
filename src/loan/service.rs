//! Loan service layer - Business logic for loan management

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::ApiError;
use crate::loan::{
    CreateLoanRequest, ListLoansQuery, Loan, LoanResponse, LoanStatus, RecordPaymentRequest,
};
use crate::models::{page_window, PaginatedResponse};
use crate::schedule::{PaymentSchedule, PaymentStatus, ScheduleGenerator, ScheduleQuery};

/// Load a loan that has not been soft-deleted
pub(crate) async fn find_loan<'e, E>(executor: E, id: Uuid) -> Result<Option<Loan>, ApiError>
where
    E: PgExecutor<'e>,
{
    let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(loan)
}

/// Load and row-lock a loan for the rest of the transaction
pub(crate) async fn lock_loan(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Loan, ApiError> {
    sqlx::query_as::<_, Loan>(
        "SELECT * FROM loans WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Loan", id))
}

/// All schedule rows of a loan ordered by period
pub(crate) async fn fetch_schedule<'e, E>(
    executor: E,
    loan_id: Uuid,
) -> Result<Vec<PaymentSchedule>, ApiError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, PaymentSchedule>(
        "SELECT * FROM payment_schedules WHERE loan_id = $1 ORDER BY payment_number ASC",
    )
    .bind(loan_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Result of applying a payment to a single schedule row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub actual_paid_amount: Decimal,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// The row moved to PAID with this payment
    pub settled: bool,
}

/// Work out the new state of a row after receiving `amount`
pub fn apply_payment(
    row: &PaymentSchedule,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<PaymentOutcome, ApiError> {
    if matches!(row.status, PaymentStatus::Paid | PaymentStatus::Cancelled) {
        return Err(ApiError::ValidationError(format!(
            "Payment {} is already {:?} and cannot take further payments",
            row.payment_number, row.status
        )));
    }

    let due = row.total_amount + row.late_fee;
    let paid = row.actual_paid_amount + amount;
    if paid > due {
        return Err(ApiError::ValidationError(format!(
            "Payment of {} exceeds the {} still due on payment {}",
            amount,
            due - row.actual_paid_amount,
            row.payment_number
        )));
    }

    let settled = paid == due;
    Ok(PaymentOutcome {
        actual_paid_amount: paid,
        status: if settled {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        },
        paid_at: settled.then_some(now),
        settled,
    })
}

/// Loan service for managing loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    db_pool: PgPool,
}

impl LoanService {
    /// Create a new loan service instance
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Create a loan together with its full payment schedule.
    ///
    /// The loan insert, the schedule batch and the activation flag commit as
    /// one transaction; if any step fails nothing is stored.
    pub async fn create_loan(
        &self,
        requester: Uuid,
        request: CreateLoanRequest,
    ) -> Result<(Loan, Vec<PaymentSchedule>), ApiError> {
        if request.user_id != requester {
            return Err(ApiError::Forbidden(
                "Loans can only be created for the requesting user".to_string(),
            ));
        }
        let terms = request.to_terms()?;
        let end_date = terms.end_date()?;

        let mut tx = self.db_pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                user_id, name, amount, interest_rate, term, repayment_type,
                start_date, end_date, payment_day, status, is_active,
                total_paid_amount, total_paid_interest, completed_payments,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, 0, 0, 0, $11, $11)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.name)
        .bind(terms.amount)
        .bind(terms.interest_rate)
        .bind(terms.term as i32)
        .bind(terms.repayment_type)
        .bind(terms.start_date)
        .bind(end_date)
        .bind(terms.payment_day as i32)
        .bind(LoanStatus::Active)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let (loan, schedule) = ScheduleGenerator::generate(&mut tx, &loan).await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            user_id = %loan.user_id,
            amount = %loan.amount,
            term = loan.term,
            "Loan created"
        );

        Ok((loan, schedule))
    }

    /// Get a loan owned by the requester
    pub async fn get_loan(&self, id: Uuid, requester: Uuid) -> Result<Loan, ApiError> {
        let loan = find_loan(&self.db_pool, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Loan", id))?;
        loan.ensure_owner(requester)?;
        Ok(loan)
    }

    /// List the requester's loans
    pub async fn list_loans(
        &self,
        requester: Uuid,
        query: ListLoansQuery,
    ) -> Result<PaginatedResponse<LoanResponse>, ApiError> {
        let (page, limit, offset) = page_window(query.page, query.limit);

        let mut count_builder: sqlx::QueryBuilder<Postgres> = sqlx::QueryBuilder::new(
            "SELECT COUNT(*) FROM loans WHERE deleted_at IS NULL AND user_id = ",
        );
        count_builder.push_bind(requester);
        if let Some(status) = query.status {
            count_builder.push(" AND status = ");
            count_builder.push_bind(status);
        }
        let (total,): (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.db_pool)
            .await?;

        let mut query_builder: sqlx::QueryBuilder<Postgres> = sqlx::QueryBuilder::new(
            "SELECT * FROM loans WHERE deleted_at IS NULL AND user_id = ",
        );
        query_builder.push_bind(requester);
        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let loans = query_builder
            .build_query_as::<Loan>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(PaginatedResponse {
            data: loans.into_iter().map(LoanResponse::from).collect(),
            total,
            page,
            limit,
        })
    }

    /// Page through a loan's schedule
    pub async fn get_schedule(
        &self,
        id: Uuid,
        requester: Uuid,
        query: ScheduleQuery,
    ) -> Result<Vec<PaymentSchedule>, ApiError> {
        self.get_loan(id, requester).await?;

        let sql = format!(
            "SELECT * FROM payment_schedules WHERE loan_id = $1 ORDER BY payment_number {} LIMIT $2 OFFSET $3",
            query.order().as_sql()
        );
        let rows = sqlx::query_as::<_, PaymentSchedule>(&sql)
            .bind(id)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.db_pool)
            .await?;

        Ok(rows)
    }

    /// Soft-delete a loan; its rows stay for audit
    pub async fn delete_loan(&self, id: Uuid, requester: Uuid) -> Result<Loan, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let loan = lock_loan(&mut tx, id).await?;
        loan.ensure_owner(requester)?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET is_active = FALSE, status = $1, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(LoanStatus::Cancelled)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(loan_id = %id, "Loan soft-deleted");
        Ok(loan)
    }

    /// Record a payment against one period and roll the loan totals forward
    pub async fn record_payment(
        &self,
        loan_id: Uuid,
        payment_number: i32,
        requester: Uuid,
        request: RecordPaymentRequest,
    ) -> Result<PaymentSchedule, ApiError> {
        request.validate_amount()?;

        let mut tx = self.db_pool.begin().await?;
        let loan = lock_loan(&mut tx, loan_id).await?;
        loan.ensure_owner(requester)?;
        if loan.status != LoanStatus::Active || !loan.is_active {
            return Err(ApiError::ValidationError(format!(
                "Loan {} is not active",
                loan_id
            )));
        }

        let row = sqlx::query_as::<_, PaymentSchedule>(
            "SELECT * FROM payment_schedules WHERE loan_id = $1 AND payment_number = $2 FOR UPDATE",
        )
        .bind(loan_id)
        .bind(payment_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Payment {} of loan {} not found",
                payment_number, loan_id
            ))
        })?;

        let outcome = apply_payment(&row, request.amount, Utc::now())?;

        let updated = sqlx::query_as::<_, PaymentSchedule>(
            r#"
            UPDATE payment_schedules
            SET actual_paid_amount = $1, status = $2, paid_at = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(outcome.actual_paid_amount)
        .bind(outcome.status)
        .bind(outcome.paid_at)
        .bind(row.id)
        .fetch_one(&mut *tx)
        .await?;

        if outcome.settled {
            sqlx::query(
                r#"
                UPDATE loans
                SET total_paid_amount = LEAST(amount, total_paid_amount + $1),
                    total_paid_interest = total_paid_interest + $2,
                    completed_payments = completed_payments + 1,
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(row.principal_amount)
            .bind(row.interest_amount)
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;

            let (open,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM payment_schedules WHERE loan_id = $1 AND status NOT IN ('paid', 'cancelled')",
            )
            .bind(loan_id)
            .fetch_one(&mut *tx)
            .await?;

            if open == 0 {
                sqlx::query("UPDATE loans SET status = $1, updated_at = NOW() WHERE id = $2")
                    .bind(LoanStatus::Completed)
                    .bind(loan_id)
                    .execute(&mut *tx)
                    .await?;
                tracing::info!(loan_id = %loan_id, "Loan fully repaid");
            }
        }

        tx.commit().await?;

        tracing::info!(
            loan_id = %loan_id,
            payment_number,
            amount = %request.amount,
            status = ?updated.status,
            "Payment recorded"
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn row(status: PaymentStatus, paid: Decimal) -> PaymentSchedule {
        PaymentSchedule {
            id: Uuid::new_v4(),
            loan_id: Uuid::new_v4(),
            payment_number: 3,
            payment_date: NaiveDate::from_ymd_opt(2024, 4, 15).unwrap(),
            principal_amount: dec!(800),
            interest_amount: dec!(200),
            total_amount: dec!(1_000),
            remaining_balance: dec!(5_000),
            status,
            actual_paid_amount: paid,
            late_fee: Decimal::ZERO,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_partial_payment() {
        let outcome = apply_payment(&row(PaymentStatus::Pending, Decimal::ZERO), dec!(400), Utc::now())
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Partial);
        assert_eq!(outcome.actual_paid_amount, dec!(400));
        assert!(outcome.paid_at.is_none());
        assert!(!outcome.settled);
    }

    #[test]
    fn test_payment_completing_a_partial_row() {
        let now = Utc::now();
        let outcome = apply_payment(&row(PaymentStatus::Partial, dec!(400)), dec!(600), now).unwrap();
        assert_eq!(outcome.status, PaymentStatus::Paid);
        assert_eq!(outcome.paid_at, Some(now));
        assert!(outcome.settled);
    }

    #[test]
    fn test_overpayment_is_rejected() {
        let err = apply_payment(&row(PaymentStatus::Pending, Decimal::ZERO), dec!(1_001), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_paid_and_cancelled_rows_are_closed() {
        assert!(apply_payment(&row(PaymentStatus::Paid, dec!(1_000)), dec!(1), Utc::now()).is_err());
        assert!(apply_payment(&row(PaymentStatus::Cancelled, Decimal::ZERO), dec!(1), Utc::now()).is_err());
    }

    #[test]
    fn test_overdue_row_can_be_paid() {
        let outcome = apply_payment(&row(PaymentStatus::Overdue, Decimal::ZERO), dec!(1_000), Utc::now())
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Paid);
    }
}
