//! Prepayment processing: registration, application and schedule recalculation

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    CreatePrepaymentRequest, Prepayment, PrepaymentSchedule, PrepaymentStatus, PrepaymentType,
    RecalculatedPeriod,
};
use crate::amortization::{self, RepaymentType};
use crate::error::ApiError;
use crate::loan::{fetch_schedule, find_loan, lock_loan, Loan, LoanStatus};
use crate::schedule::{PaymentSchedule, PaymentStatus};

/// Check a new prepayment against the current state of its loan.
///
/// `prepayable` is the principal the prepayment may reduce, see
/// [`PrepaymentWindow::prepayable_balance`].
pub fn validate_creation(
    loan: &Loan,
    request: &CreatePrepaymentRequest,
    prepayable: Decimal,
) -> Result<(), ApiError> {
    if loan.status != LoanStatus::Active || !loan.is_active {
        return Err(ApiError::ValidationError(format!(
            "Loan {} is not active",
            loan.id
        )));
    }
    if request.amount <= Decimal::ZERO || !request.amount.fract().is_zero() {
        return Err(ApiError::ValidationError(
            "Prepayment amount must be a positive whole number of minor units".to_string(),
        ));
    }

    if request.amount > prepayable {
        return Err(ApiError::ValidationError(format!(
            "Prepayment amount {} exceeds the prepayable balance {}",
            request.amount, prepayable
        )));
    }
    if request.prepayment_type == PrepaymentType::Full && request.amount != prepayable {
        return Err(ApiError::ValidationError(format!(
            "A full prepayment must equal the prepayable balance {}",
            prepayable
        )));
    }
    if request.prepayment_date < loan.start_date {
        return Err(ApiError::ValidationError(
            "Prepayment date cannot precede the loan start date".to_string(),
        ));
    }

    Ok(())
}

/// Check that a prepayment may be applied right now
pub fn validate_application(
    prepayment: &Prepayment,
    loan: &Loan,
    requester: Uuid,
    prepayable: Decimal,
) -> Result<(), ApiError> {
    loan.ensure_owner(requester)?;

    if prepayment.status != PrepaymentStatus::Pending {
        return Err(ApiError::ValidationError(format!(
            "Prepayment {} is {:?}, only pending prepayments can be applied",
            prepayment.id, prepayment.status
        )));
    }
    if loan.status != LoanStatus::Active {
        return Err(ApiError::ValidationError(format!(
            "Loan {} is not active",
            loan.id
        )));
    }

    if prepayment.amount > prepayable {
        return Err(ApiError::ValidationError(format!(
            "Prepayment amount {} exceeds the prepayable balance {}",
            prepayment.amount, prepayable
        )));
    }

    Ok(())
}

/// Recompute the open periods against a reduced balance.
///
/// `rows` are the periods due on or after the prepayment date that are still
/// open (pending or overdue), in payment order. The new balance is spread over
/// exactly that many periods with the loan's own repayment formula. A zero
/// balance zeroes every period.
pub fn recalculate(
    rows: &[PaymentSchedule],
    new_balance: Decimal,
    repayment_type: RepaymentType,
    monthly_rate: Decimal,
) -> Result<Vec<RecalculatedPeriod>, ApiError> {
    if rows.is_empty() {
        if new_balance.is_zero() {
            return Ok(Vec::new());
        }
        return Err(ApiError::ValidationError(
            "No open periods remain on or after the prepayment date".to_string(),
        ));
    }

    let installments = if new_balance.is_zero() {
        None
    } else {
        Some(amortization::amortize(
            repayment_type,
            new_balance,
            monthly_rate,
            rows.len() as u32,
        )?)
    };

    let periods = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let (principal, interest, total, remaining) = match &installments {
                Some(plan) => {
                    let p = &plan[i];
                    (p.principal, p.interest, p.total, p.remaining_balance)
                }
                None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            };

            RecalculatedPeriod {
                schedule_id: row.id,
                payment_number: row.payment_number,
                original_principal: row.principal_amount,
                original_interest: row.interest_amount,
                original_total: row.total_amount,
                new_principal: principal,
                new_interest: interest,
                new_total: total,
                new_remaining_balance: remaining,
            }
        })
        .collect();

    Ok(periods)
}

/// A loan's schedule split around a prepayment date.
///
/// Open rows are rewritten by the prepayment. Every other unsettled row
/// (pending or overdue before the date, partial on any date) is held: it
/// keeps billing its own principal, which therefore cannot be prepaid.
#[derive(Debug, Clone)]
pub struct PrepaymentWindow {
    pub open_rows: Vec<PaymentSchedule>,
    pub held_principal: Decimal,
    pub held_periods: usize,
}

impl PrepaymentWindow {
    pub fn new(schedule: Vec<PaymentSchedule>, prepayment_date: chrono::NaiveDate) -> Self {
        let (open_rows, rest): (Vec<_>, Vec<_>) = schedule
            .into_iter()
            .partition(|row| is_open_on(row, prepayment_date));

        let held: Vec<&PaymentSchedule> = rest
            .iter()
            .filter(|row| !matches!(row.status, PaymentStatus::Paid | PaymentStatus::Cancelled))
            .collect();

        Self {
            open_rows,
            held_principal: held.iter().map(|row| row.principal_amount).sum(),
            held_periods: held.len(),
        }
    }

    /// Principal a prepayment on this date may reduce: the outstanding
    /// balance less what held rows still bill.
    pub fn prepayable_balance(&self, loan: &Loan) -> Decimal {
        (loan.remaining_balance() - self.held_principal).max(Decimal::ZERO)
    }

    /// Whether nothing stays owed once the open rows are cleared
    pub fn settles_loan(&self, new_balance: Decimal) -> bool {
        new_balance.is_zero() && self.held_periods == 0
    }
}

fn is_open_on(row: &PaymentSchedule, prepayment_date: chrono::NaiveDate) -> bool {
    row.payment_date >= prepayment_date && row.status.is_recalculable()
}

/// Prepayment service
#[derive(Clone)]
pub struct PrepaymentService {
    db_pool: PgPool,
}

impl PrepaymentService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Register a pending prepayment
    pub async fn create_prepayment(
        &self,
        loan_id: Uuid,
        requester: Uuid,
        request: CreatePrepaymentRequest,
    ) -> Result<Prepayment, ApiError> {
        let loan = find_loan(&self.db_pool, loan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Loan", loan_id))?;
        loan.ensure_owner(requester)?;
        let window = PrepaymentWindow::new(
            fetch_schedule(&self.db_pool, loan_id).await?,
            request.prepayment_date,
        );
        validate_creation(&loan, &request, window.prepayable_balance(&loan))?;

        let prepayment = sqlx::query_as::<_, Prepayment>(
            r#"
            INSERT INTO prepayments (
                loan_id, user_id, amount, prepayment_type, prepayment_date, status,
                interest_savings, principal_reduction, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, 0, $7, $7)
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(requester)
        .bind(request.amount)
        .bind(request.prepayment_type)
        .bind(request.prepayment_date)
        .bind(PrepaymentStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            prepayment_id = %prepayment.id,
            loan_id = %loan_id,
            amount = %prepayment.amount,
            "Prepayment registered"
        );

        Ok(prepayment)
    }

    /// Get a prepayment whose loan belongs to the requester
    pub async fn get_prepayment(&self, id: Uuid, requester: Uuid) -> Result<Prepayment, ApiError> {
        let prepayment = self.find_prepayment(id).await?;
        let loan = find_loan(&self.db_pool, prepayment.loan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Loan", prepayment.loan_id))?;
        loan.ensure_owner(requester)?;
        Ok(prepayment)
    }

    /// Prepayments of a loan, newest first
    pub async fn list_prepayments(
        &self,
        loan_id: Uuid,
        requester: Uuid,
    ) -> Result<Vec<Prepayment>, ApiError> {
        let loan = find_loan(&self.db_pool, loan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Loan", loan_id))?;
        loan.ensure_owner(requester)?;

        let prepayments = sqlx::query_as::<_, Prepayment>(
            "SELECT * FROM prepayments WHERE loan_id = $1 ORDER BY created_at DESC",
        )
        .bind(loan_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(prepayments)
    }

    /// Before/after snapshots recorded when the prepayment was applied
    pub async fn get_snapshots(
        &self,
        id: Uuid,
        requester: Uuid,
    ) -> Result<Vec<PrepaymentSchedule>, ApiError> {
        self.get_prepayment(id, requester).await?;

        let snapshots = sqlx::query_as::<_, PrepaymentSchedule>(
            "SELECT * FROM prepayment_schedules WHERE prepayment_id = $1 ORDER BY payment_number ASC",
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(snapshots)
    }

    /// Withdraw a prepayment that has not been applied
    pub async fn cancel_prepayment(&self, id: Uuid, requester: Uuid) -> Result<Prepayment, ApiError> {
        let prepayment = self.get_prepayment(id, requester).await?;
        if prepayment.status != PrepaymentStatus::Pending {
            return Err(ApiError::ValidationError(format!(
                "Prepayment {} is {:?}, only pending prepayments can be cancelled",
                id, prepayment.status
            )));
        }

        let cancelled = sqlx::query_as::<_, Prepayment>(
            r#"
            UPDATE prepayments SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(PrepaymentStatus::Cancelled)
        .bind(id)
        .bind(PrepaymentStatus::Pending)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("Prepayment {} changed concurrently", id)))?;

        tracing::info!(prepayment_id = %id, "Prepayment cancelled");
        Ok(cancelled)
    }

    /// Apply a pending prepayment and recalculate the open periods.
    ///
    /// The loan row is locked for the whole transaction, so applications and
    /// payments against the same loan are serialized. Any failure rolls back
    /// every write, leaving the schedule untouched.
    pub async fn apply_prepayment(&self, id: Uuid, requester: Uuid) -> Result<Prepayment, ApiError> {
        let prepayment = self.find_prepayment(id).await?;

        let mut tx = self.db_pool.begin().await?;
        let loan = lock_loan(&mut tx, prepayment.loan_id).await?;

        // re-read under the loan lock
        let prepayment = sqlx::query_as::<_, Prepayment>("SELECT * FROM prepayments WHERE id = $1")
            .bind(prepayment.id)
            .fetch_one(&mut *tx)
            .await?;
        let window = PrepaymentWindow::new(
            fetch_schedule(&mut *tx, loan.id).await?,
            prepayment.prepayment_date,
        );
        let prepayable = window.prepayable_balance(&loan);
        validate_application(&prepayment, &loan, requester, prepayable)?;

        // only the open rows' share of the balance is respread
        let new_balance = prepayable - prepayment.amount;
        let periods = recalculate(
            &window.open_rows,
            new_balance,
            loan.repayment_type,
            loan.monthly_rate(),
        )?;

        let cleared = new_balance.is_zero();
        let settled = window.settles_loan(new_balance);
        let row_status = if cleared {
            PaymentStatus::Cancelled
        } else {
            PaymentStatus::Pending
        };
        for period in &periods {
            sqlx::query(
                r#"
                UPDATE payment_schedules
                SET principal_amount = $1, interest_amount = $2, total_amount = $3,
                    remaining_balance = $4, status = CASE WHEN $5 THEN $6 ELSE status END,
                    updated_at = NOW()
                WHERE id = $7
                "#,
            )
            .bind(period.new_principal)
            .bind(period.new_interest)
            .bind(period.new_total)
            .bind(period.new_remaining_balance)
            .bind(cleared)
            .bind(row_status)
            .bind(period.schedule_id)
            .execute(&mut *tx)
            .await?;
        }

        let interest_savings: Decimal = periods.iter().map(RecalculatedPeriod::interest_saved).sum();
        let loan_status = if settled {
            LoanStatus::Completed
        } else {
            loan.status
        };

        sqlx::query(
            r#"
            UPDATE loans
            SET total_paid_amount = total_paid_amount + $1, status = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(prepayment.amount)
        .bind(loan_status)
        .bind(loan.id)
        .execute(&mut *tx)
        .await?;

        let applied = sqlx::query_as::<_, Prepayment>(
            r#"
            UPDATE prepayments
            SET status = $1, interest_savings = $2, principal_reduction = $3,
                applied_at = NOW(), updated_at = NOW()
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(PrepaymentStatus::Applied)
        .bind(interest_savings)
        .bind(prepayment.amount)
        .bind(prepayment.id)
        .bind(PrepaymentStatus::Pending)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("Prepayment {} was already processed", id)))?;

        if !periods.is_empty() {
            let mut snapshot_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO prepayment_schedules (
                    prepayment_id, payment_schedule_id, payment_number,
                    original_principal, original_interest, original_total,
                    new_principal, new_interest, new_total, new_remaining_balance
                )
                "#,
            );
            snapshot_builder.push_values(periods.iter(), |mut b, period| {
                b.push_bind(applied.id)
                    .push_bind(period.schedule_id)
                    .push_bind(period.payment_number)
                    .push_bind(period.original_principal)
                    .push_bind(period.original_interest)
                    .push_bind(period.original_total)
                    .push_bind(period.new_principal)
                    .push_bind(period.new_interest)
                    .push_bind(period.new_total)
                    .push_bind(period.new_remaining_balance);
            });
            snapshot_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::info!(
            prepayment_id = %applied.id,
            loan_id = %loan.id,
            amount = %applied.amount,
            interest_savings = %interest_savings,
            periods = periods.len(),
            settled,
            "Prepayment applied"
        );

        Ok(applied)
    }

    async fn find_prepayment(&self, id: Uuid) -> Result<Prepayment, ApiError> {
        sqlx::query_as::<_, Prepayment>("SELECT * FROM prepayments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Prepayment", id))
    }
}
