//! Loan models and request DTOs

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::amortization::{self, RepaymentType};
use crate::error::ApiError;
use crate::scheduler::UpcomingPayment;

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    Completed,
    Defaulted,
    Cancelled,
}

/// Loan model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    /// Annual rate in percent
    pub interest_rate: Decimal,
    /// Term in months
    pub term: i32,
    pub repayment_type: RepaymentType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub payment_day: i32,
    pub status: LoanStatus,
    pub is_active: bool,
    /// Principal repaid so far, prepayments included
    pub total_paid_amount: Decimal,
    pub total_paid_interest: Decimal,
    pub completed_payments: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// Principal still owed
    pub fn remaining_balance(&self) -> Decimal {
        (self.amount - self.total_paid_amount).max(Decimal::ZERO)
    }

    pub fn remaining_payments(&self) -> i32 {
        (self.term - self.completed_payments).max(0)
    }

    pub fn monthly_rate(&self) -> Decimal {
        amortization::monthly_rate(self.interest_rate)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Reject access by anyone but the borrower
    pub fn ensure_owner(&self, requester: Uuid) -> Result<(), ApiError> {
        if self.user_id != requester {
            return Err(ApiError::Forbidden(format!(
                "Loan {} does not belong to the requesting user",
                self.id
            )));
        }
        Ok(())
    }

    /// Amortization inputs of this loan
    pub fn terms(&self) -> LoanTerms {
        LoanTerms {
            amount: self.amount,
            interest_rate: self.interest_rate,
            term: self.term as u32,
            repayment_type: self.repayment_type,
            start_date: self.start_date,
            payment_day: self.payment_day as u32,
        }
    }
}

/// Loan plus derived balance figures
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    #[serde(flatten)]
    pub loan: Loan,
    pub remaining_balance: Decimal,
    pub remaining_payments: i32,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            remaining_balance: loan.remaining_balance(),
            remaining_payments: loan.remaining_payments(),
            loan,
        }
    }
}

/// Validated amortization inputs shared by loan creation and simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanTerms {
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub term: u32,
    pub repayment_type: RepaymentType,
    pub start_date: NaiveDate,
    pub payment_day: u32,
}

impl LoanTerms {
    pub fn monthly_rate(&self) -> Decimal {
        amortization::monthly_rate(self.interest_rate)
    }

    /// Last day of the loan: start date moved forward by the term
    pub fn end_date(&self) -> Result<NaiveDate, ApiError> {
        self.start_date
            .checked_add_months(Months::new(self.term))
            .ok_or_else(|| ApiError::ValidationError("Loan end date is out of range".to_string()))
    }
}

/// Largest amount the `NUMERIC(20, 0)` money columns hold
pub const MAX_AMOUNT: Decimal = dec!(99_999_999_999_999_999_999);

/// Rates are stored as `NUMERIC(9, 4)`
pub const INTEREST_RATE_SCALE: u32 = 4;

fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    if *amount > MAX_AMOUNT {
        return Err(ValidationError::new("amount_too_large"));
    }
    if !amount.fract().is_zero() {
        return Err(ValidationError::new("amount_must_be_whole_minor_units"));
    }
    Ok(())
}

fn validate_interest_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate < Decimal::ZERO || *rate > dec!(100) {
        return Err(ValidationError::new("interest_rate_out_of_range"));
    }
    // a finer rate would be rounded on insert and drift from the generated schedule
    if rate.normalize().scale() > INTEREST_RATE_SCALE {
        return Err(ValidationError::new("interest_rate_too_precise"));
    }
    Ok(())
}

/// Request to create a new loan
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLoanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom = "validate_amount")]
    pub amount: Decimal,
    #[validate(custom = "validate_interest_rate")]
    pub interest_rate: Decimal,
    #[validate(range(min = 1, max = 600))]
    pub term: i32,
    pub repayment_type: String,
    pub start_date: NaiveDate,
    #[validate(range(min = 1, max = 31))]
    pub payment_day: Option<i32>,
    pub user_id: Uuid,
}

impl CreateLoanRequest {
    /// Validate the request and resolve it into amortization terms
    pub fn to_terms(&self) -> Result<LoanTerms, ApiError> {
        self.validate()?;

        let repayment_type = self.repayment_type.parse::<RepaymentType>()?;
        let terms = LoanTerms {
            amount: self.amount,
            interest_rate: self.interest_rate,
            term: self.term as u32,
            repayment_type,
            start_date: self.start_date,
            payment_day: self
                .payment_day
                .map(|d| d as u32)
                .unwrap_or_else(|| self.start_date.day()),
        };
        terms.end_date()?;

        Ok(terms)
    }
}

/// Request body of the schedule simulation endpoint
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SimulateLoanRequest {
    #[validate(custom = "validate_amount")]
    pub amount: Decimal,
    #[validate(custom = "validate_interest_rate")]
    pub interest_rate: Decimal,
    #[validate(range(min = 1, max = 600))]
    pub term: i32,
    pub repayment_type: String,
    pub start_date: NaiveDate,
    #[validate(range(min = 1, max = 31))]
    pub payment_day: Option<i32>,
}

impl SimulateLoanRequest {
    pub fn to_terms(&self) -> Result<LoanTerms, ApiError> {
        CreateLoanRequest {
            name: "simulation".to_string(),
            amount: self.amount,
            interest_rate: self.interest_rate,
            term: self.term,
            repayment_type: self.repayment_type.clone(),
            start_date: self.start_date,
            payment_day: self.payment_day,
            user_id: Uuid::nil(),
        }
        .to_terms()
    }
}

/// Request to record a payment against one period
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
}

impl RecordPaymentRequest {
    pub fn validate_amount(&self) -> Result<(), ApiError> {
        validate_amount(&self.amount).map_err(|_| {
            ApiError::ValidationError(
                "Payment amount must be a positive whole number of minor units".to_string(),
            )
        })
    }
}

/// Query for listing loans
#[derive(Debug, Default, Deserialize)]
pub struct ListLoansQuery {
    pub status: Option<LoanStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Loan lifecycle events pushed to websocket subscribers
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type")]
pub enum LoanEvent {
    LoanCreated {
        loan_id: Uuid,
        user_id: Uuid,
        periods: usize,
    },
    PaymentRecorded {
        loan_id: Uuid,
        payment_number: i32,
        amount: Decimal,
    },
    PrepaymentApplied {
        loan_id: Uuid,
        prepayment_id: Uuid,
        interest_savings: Decimal,
    },
    PaymentDue {
        payment: UpcomingPayment,
    },
}

impl LoanEvent {
    pub fn loan_id(&self) -> Uuid {
        match self {
            LoanEvent::LoanCreated { loan_id, .. }
            | LoanEvent::PaymentRecorded { loan_id, .. }
            | LoanEvent::PrepaymentApplied { loan_id, .. } => *loan_id,
            LoanEvent::PaymentDue { payment } => payment.loan_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateLoanRequest {
        CreateLoanRequest {
            name: "Car".to_string(),
            amount: dec!(10_000_000),
            interest_rate: dec!(5),
            term: 12,
            repayment_type: "EQUAL_INSTALLMENT".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            payment_day: None,
            user_id: Uuid::new_v4(),
        }
    }

    fn loan() -> Loan {
        Loan {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Car".to_string(),
            amount: dec!(1_000),
            interest_rate: dec!(12),
            term: 12,
            repayment_type: RepaymentType::EqualPrincipal,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            payment_day: 1,
            status: LoanStatus::Active,
            is_active: true,
            total_paid_amount: dec!(250),
            total_paid_interest: dec!(20),
            completed_payments: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_payment_day_defaults_to_start_day() {
        let terms = request().to_terms().unwrap();
        assert_eq!(terms.payment_day, 31);
        assert_eq!(terms.repayment_type, RepaymentType::EqualInstallment);
    }

    #[test]
    fn test_end_date_adds_term_months() {
        let terms = request().to_terms().unwrap();
        assert_eq!(
            terms.end_date().unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
    }

    #[test]
    fn test_unknown_repayment_type_is_rejected() {
        let mut req = request();
        req.repayment_type = "INTEREST_FREE_FOREVER".to_string();
        let err = req.to_terms().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_invalid_amounts_are_rejected() {
        let mut req = request();
        req.amount = dec!(0);
        assert!(req.to_terms().is_err());

        req.amount = dec!(100.5);
        assert!(req.to_terms().is_err());
    }

    #[test]
    fn test_invalid_term_and_day_are_rejected() {
        let mut req = request();
        req.term = 0;
        assert!(req.to_terms().is_err());

        let mut req = request();
        req.payment_day = Some(32);
        assert!(req.to_terms().is_err());

        let mut req = request();
        req.interest_rate = dec!(-1);
        assert!(req.to_terms().is_err());
    }

    #[test]
    fn test_interest_rate_precision_matches_storage() {
        let mut req = request();
        req.interest_rate = dec!(5.1234);
        assert!(req.to_terms().is_ok());

        req.interest_rate = dec!(5.12340);
        assert!(req.to_terms().is_ok());

        req.interest_rate = dec!(5.12345);
        assert!(matches!(req.to_terms(), Err(ApiError::ValidationError(_))));
    }

    #[test]
    fn test_amount_is_capped_at_column_size() {
        let mut req = request();
        req.amount = MAX_AMOUNT;
        assert!(req.to_terms().is_ok());

        req.amount = MAX_AMOUNT + Decimal::ONE;
        assert!(matches!(req.to_terms(), Err(ApiError::ValidationError(_))));

        let payment = RecordPaymentRequest {
            amount: MAX_AMOUNT + Decimal::ONE,
        };
        assert!(payment.validate_amount().is_err());
    }

    #[test]
    fn test_remaining_figures() {
        let loan = loan();
        assert_eq!(loan.remaining_balance(), dec!(750));
        assert_eq!(loan.remaining_payments(), 9);
        assert_eq!(loan.monthly_rate(), dec!(0.01));
    }

    #[test]
    fn test_ensure_owner() {
        let loan = loan();
        assert!(loan.ensure_owner(loan.user_id).is_ok());
        assert!(matches!(
            loan.ensure_owner(Uuid::new_v4()),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_loan_response_flattens_loan() {
        let response = LoanResponse::from(loan());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["remaining_payments"], 9);
        assert_eq!(json["repayment_type"], "EQUAL_PRINCIPAL");
        assert!(json.get("id").is_some());
    }
}
