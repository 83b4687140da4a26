//! Amortization formulas for the supported repayment methods
//!
//! Everything in this module is pure. [`calculate_period`] evaluates one
//! period exactly (no rounding), [`amortize`] walks the whole term and rounds
//! each row to whole minor units.

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest supported term in months (50 years)
pub const MAX_TERM_MONTHS: u32 = 600;

/// Errors raised by the amortization formulas
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmortizationError {
    #[error("Unsupported repayment type: {0}")]
    UnsupportedRepaymentType(String),

    #[error("Term must be between 1 and {MAX_TERM_MONTHS} months, got {0}")]
    InvalidTerm(u32),

    #[error("Period {period} is outside of a {term}-month term")]
    PeriodOutOfRange { period: u32, term: u32 },

    #[error("Principal must not be negative")]
    NegativePrincipal,

    #[error("Interest rate must not be negative")]
    NegativeRate,

    #[error("Arithmetic overflow while evaluating the schedule")]
    Overflow,
}

/// Repayment method of a loan
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "repayment_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentType {
    /// Constant total payment, shifting principal/interest mix
    EqualInstallment,
    /// Constant principal, declining interest
    EqualPrincipal,
    /// Interest only until a final lump sum
    BulletPayment,
}

impl RepaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentType::EqualInstallment => "EQUAL_INSTALLMENT",
            RepaymentType::EqualPrincipal => "EQUAL_PRINCIPAL",
            RepaymentType::BulletPayment => "BULLET_PAYMENT",
        }
    }
}

impl fmt::Display for RepaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepaymentType {
    type Err = AmortizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "EQUAL_INSTALLMENT" => Ok(RepaymentType::EqualInstallment),
            "EQUAL_PRINCIPAL" => Ok(RepaymentType::EqualPrincipal),
            "BULLET_PAYMENT" => Ok(RepaymentType::BulletPayment),
            _ => Err(AmortizationError::UnsupportedRepaymentType(s.to_string())),
        }
    }
}

/// Exact (unrounded) amounts of a single period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodAmounts {
    pub principal: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
    /// Outstanding principal once this period is paid
    pub remaining_balance: Decimal,
}

/// Rounded amounts of one schedule row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Installment {
    pub period: u32,
    pub principal: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
    pub remaining_balance: Decimal,
}

/// Convert an annual percentage rate (e.g. `5` for 5%) to a monthly fraction
pub fn monthly_rate(annual_percent: Decimal) -> Decimal {
    annual_percent / dec!(100) / dec!(12)
}

/// Round to whole minor units, half away from zero
pub fn round_minor(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn growth(monthly_rate: Decimal, periods: u32) -> Result<Decimal, AmortizationError> {
    (Decimal::ONE + monthly_rate)
        .checked_powi(periods as i64)
        .ok_or(AmortizationError::Overflow)
}

/// Fixed monthly payment of an equal-installment loan
pub fn fixed_installment(
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
) -> Result<Decimal, AmortizationError> {
    if term_months == 0 {
        return Err(AmortizationError::InvalidTerm(term_months));
    }
    let n = Decimal::from(term_months);

    if monthly_rate.is_zero() {
        return Ok(principal / n);
    }

    let g = growth(monthly_rate, term_months)?;
    let numerator = principal
        .checked_mul(monthly_rate)
        .and_then(|v| v.checked_mul(g))
        .ok_or(AmortizationError::Overflow)?;

    numerator
        .checked_div(g - Decimal::ONE)
        .ok_or(AmortizationError::Overflow)
}

/// Principal still outstanding after `periods` equal installments
fn balance_after(
    principal: Decimal,
    monthly_rate: Decimal,
    installment: Decimal,
    periods: u32,
) -> Result<Decimal, AmortizationError> {
    if monthly_rate.is_zero() {
        return Ok(principal - installment * Decimal::from(periods));
    }

    let g = growth(monthly_rate, periods)?;
    let grown = principal.checked_mul(g).ok_or(AmortizationError::Overflow)?;
    let paid = installment
        .checked_mul(g - Decimal::ONE)
        .and_then(|v| v.checked_div(monthly_rate))
        .ok_or(AmortizationError::Overflow)?;

    Ok(grown - paid)
}

/// Evaluate period `period` (1-based) of a `term_months` schedule
pub fn calculate_period(
    repayment_type: RepaymentType,
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
    period: u32,
) -> Result<PeriodAmounts, AmortizationError> {
    if term_months == 0 || term_months > MAX_TERM_MONTHS {
        return Err(AmortizationError::InvalidTerm(term_months));
    }
    if period == 0 || period > term_months {
        return Err(AmortizationError::PeriodOutOfRange {
            period,
            term: term_months,
        });
    }
    check_inputs(principal, monthly_rate)?;

    let is_final = period == term_months;

    let amounts = match repayment_type {
        RepaymentType::EqualInstallment => {
            let installment = fixed_installment(principal, monthly_rate, term_months)?;
            let before = balance_after(principal, monthly_rate, installment, period - 1)?;
            let (principal_part, remaining) = if is_final {
                (before, Decimal::ZERO)
            } else {
                let after = balance_after(principal, monthly_rate, installment, period)?;
                (before - after, after)
            };

            PeriodAmounts {
                principal: principal_part,
                interest: installment - principal_part,
                total: installment,
                remaining_balance: remaining,
            }
        }
        RepaymentType::EqualPrincipal => {
            let portion = principal / Decimal::from(term_months);
            let before = principal - portion * Decimal::from(period - 1);
            let interest = before * monthly_rate;
            let (principal_part, remaining) = if is_final {
                (before, Decimal::ZERO)
            } else {
                (portion, before - portion)
            };

            PeriodAmounts {
                principal: principal_part,
                interest,
                total: principal_part + interest,
                remaining_balance: remaining,
            }
        }
        RepaymentType::BulletPayment => {
            let interest = principal * monthly_rate;
            let (principal_part, remaining) = if is_final {
                (principal, Decimal::ZERO)
            } else {
                (Decimal::ZERO, principal)
            };

            PeriodAmounts {
                principal: principal_part,
                interest,
                total: principal_part + interest,
                remaining_balance: remaining,
            }
        }
    };

    Ok(amounts)
}

fn check_inputs(principal: Decimal, monthly_rate: Decimal) -> Result<(), AmortizationError> {
    if principal.is_sign_negative() && !principal.is_zero() {
        return Err(AmortizationError::NegativePrincipal);
    }
    if monthly_rate.is_sign_negative() && !monthly_rate.is_zero() {
        return Err(AmortizationError::NegativeRate);
    }
    Ok(())
}

/// Build the rounded rows of a full schedule.
///
/// Every row's remaining balance is the rounded exact balance from
/// [`calculate_period`], and its principal is the drop between consecutive
/// rounded balances, so the principals add up to the rounded starting
/// principal and the last row closes at zero. Equal installments bill the
/// rounded fixed payment on every period but the last, with interest as the
/// remainder; the other methods round their exact interest.
pub fn amortize(
    repayment_type: RepaymentType,
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
) -> Result<Vec<Installment>, AmortizationError> {
    if term_months == 0 || term_months > MAX_TERM_MONTHS {
        return Err(AmortizationError::InvalidTerm(term_months));
    }
    check_inputs(principal, monthly_rate)?;

    match repayment_type {
        RepaymentType::EqualInstallment => level_payment_rows(principal, monthly_rate, term_months),
        RepaymentType::EqualPrincipal | RepaymentType::BulletPayment => {
            rounded_exact_rows(repayment_type, principal, monthly_rate, term_months)
        }
    }
}

fn level_payment_rows(
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
) -> Result<Vec<Installment>, AmortizationError> {
    let payment = round_minor(fixed_installment(principal, monthly_rate, term_months)?);
    let mut previous_balance = round_minor(principal);
    let mut rows = Vec::with_capacity(term_months as usize);

    for period in 1..=term_months {
        let exact = calculate_period(
            RepaymentType::EqualInstallment,
            principal,
            monthly_rate,
            term_months,
            period,
        )?;

        let (principal_part, interest, remaining_balance) = if period == term_months {
            (previous_balance, round_minor(exact.interest), Decimal::ZERO)
        } else {
            // anchor to the exact balance so rounding never compounds
            let remaining = round_minor(exact.remaining_balance).clamp(Decimal::ZERO, previous_balance);
            let principal_part = previous_balance - remaining;
            (principal_part, (payment - principal_part).max(Decimal::ZERO), remaining)
        };

        rows.push(Installment {
            period,
            principal: principal_part,
            interest,
            total: principal_part + interest,
            remaining_balance,
        });
        previous_balance = remaining_balance;
    }

    Ok(rows)
}

fn rounded_exact_rows(
    repayment_type: RepaymentType,
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
) -> Result<Vec<Installment>, AmortizationError> {
    let mut rows = Vec::with_capacity(term_months as usize);
    let mut previous_balance = round_minor(principal);

    for period in 1..=term_months {
        let exact = calculate_period(repayment_type, principal, monthly_rate, term_months, period)?;

        let remaining_balance = if period == term_months {
            Decimal::ZERO
        } else {
            round_minor(exact.remaining_balance).max(Decimal::ZERO)
        };
        let principal_part = previous_balance - remaining_balance;
        let interest = round_minor(exact.interest);

        rows.push(Installment {
            period,
            principal: principal_part,
            interest,
            total: principal_part + interest,
            remaining_balance,
        });
        previous_balance = remaining_balance;
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_5pct() -> Decimal {
        monthly_rate(dec!(5))
    }

    #[test]
    fn test_repayment_type_from_str() {
        assert_eq!(
            "EQUAL_INSTALLMENT".parse::<RepaymentType>().unwrap(),
            RepaymentType::EqualInstallment
        );
        assert_eq!(
            "equal_principal".parse::<RepaymentType>().unwrap(),
            RepaymentType::EqualPrincipal
        );
        assert_eq!(
            "bullet-payment".parse::<RepaymentType>().unwrap(),
            RepaymentType::BulletPayment
        );

        let err = "BALLOON".parse::<RepaymentType>().unwrap_err();
        assert_eq!(
            err,
            AmortizationError::UnsupportedRepaymentType("BALLOON".to_string())
        );
    }

    #[test]
    fn test_repayment_type_serde_names() {
        let json = serde_json::to_string(&RepaymentType::BulletPayment).unwrap();
        assert_eq!(json, "\"BULLET_PAYMENT\"");
        let parsed: RepaymentType = serde_json::from_str("\"EQUAL_PRINCIPAL\"").unwrap();
        assert_eq!(parsed, RepaymentType::EqualPrincipal);
    }

    #[test]
    fn test_monthly_rate() {
        assert_eq!(monthly_rate(dec!(12)), dec!(0.01));
        assert_eq!(monthly_rate(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_round_minor_half_away_from_zero() {
        assert_eq!(round_minor(dec!(41666.5)), dec!(41667));
        assert_eq!(round_minor(dec!(41666.49)), dec!(41666));
        assert_eq!(round_minor(dec!(-0.5)), dec!(-1));
    }

    #[test]
    fn test_fixed_installment_reference_value() {
        let payment = fixed_installment(dec!(10_000_000), rate_5pct(), 12).unwrap();
        assert_eq!(round_minor(payment), dec!(856075));
    }

    #[test]
    fn test_fixed_installment_zero_rate() {
        let payment = fixed_installment(dec!(1_200), Decimal::ZERO, 12).unwrap();
        assert_eq!(payment, dec!(100));
    }

    #[test]
    fn test_equal_installment_period_parts_sum_to_payment() {
        let first =
            calculate_period(RepaymentType::EqualInstallment, dec!(10_000_000), rate_5pct(), 12, 1)
                .unwrap();
        assert_eq!(first.principal + first.interest, first.total);
        // first month's interest is the full balance times the monthly rate
        assert_eq!(round_minor(first.interest), dec!(41667));
    }

    #[test]
    fn test_equal_installment_final_period_closes_balance() {
        let last =
            calculate_period(RepaymentType::EqualInstallment, dec!(10_000_000), rate_5pct(), 12, 12)
                .unwrap();
        assert_eq!(last.remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_equal_principal_interest_uses_opening_balance() {
        let second =
            calculate_period(RepaymentType::EqualPrincipal, dec!(1_200_000), dec!(0.01), 12, 2)
                .unwrap();
        assert_eq!(second.principal, dec!(100_000));
        assert_eq!(second.interest, dec!(11_000));
        assert_eq!(second.remaining_balance, dec!(1_000_000));
    }

    #[test]
    fn test_bullet_payment_periods() {
        let mid = calculate_period(RepaymentType::BulletPayment, dec!(1_000), dec!(0.01), 6, 3)
            .unwrap();
        assert_eq!(mid.principal, Decimal::ZERO);
        assert_eq!(mid.interest, dec!(10));
        assert_eq!(mid.remaining_balance, dec!(1_000));

        let last = calculate_period(RepaymentType::BulletPayment, dec!(1_000), dec!(0.01), 6, 6)
            .unwrap();
        assert_eq!(last.principal, dec!(1_000));
        assert_eq!(last.total, dec!(1_010));
        assert_eq!(last.remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_calculate_period_rejects_bad_input() {
        assert_eq!(
            calculate_period(RepaymentType::EqualPrincipal, dec!(100), dec!(0.01), 0, 1),
            Err(AmortizationError::InvalidTerm(0))
        );
        assert_eq!(
            calculate_period(RepaymentType::EqualPrincipal, dec!(100), dec!(0.01), 12, 13),
            Err(AmortizationError::PeriodOutOfRange {
                period: 13,
                term: 12
            })
        );
        assert_eq!(
            calculate_period(RepaymentType::EqualPrincipal, dec!(-1), dec!(0.01), 12, 1),
            Err(AmortizationError::NegativePrincipal)
        );
        assert_eq!(
            calculate_period(RepaymentType::EqualPrincipal, dec!(1), dec!(-0.01), 12, 1),
            Err(AmortizationError::NegativeRate)
        );
    }

    #[test]
    fn test_amortize_equal_installment_reference_scenario() {
        let rows =
            amortize(RepaymentType::EqualInstallment, dec!(10_000_000), rate_5pct(), 12).unwrap();

        assert_eq!(rows.len(), 12);
        for row in &rows[..11] {
            assert_eq!(row.total, dec!(856075));
        }
        assert!((rows[11].total - dec!(856075)).abs() <= Decimal::ONE);
        assert_eq!(rows[11].remaining_balance, Decimal::ZERO);

        let principal: Decimal = rows.iter().map(|r| r.principal).sum();
        assert_eq!(principal, dec!(10_000_000));
    }

    #[test]
    fn test_amortize_equal_principal_properties() {
        let rows =
            amortize(RepaymentType::EqualPrincipal, dec!(1_000_000), monthly_rate(dec!(7)), 7)
                .unwrap();

        let first = rows[0].principal;
        for pair in rows.windows(2) {
            assert!((pair[1].principal - first).abs() <= Decimal::ONE);
            assert!(pair[1].interest <= pair[0].interest);
        }
        let principal: Decimal = rows.iter().map(|r| r.principal).sum();
        assert_eq!(principal, dec!(1_000_000));
    }

    #[test]
    fn test_amortize_bullet_reference_scenario() {
        let rows =
            amortize(RepaymentType::BulletPayment, dec!(10_000_000), rate_5pct(), 12).unwrap();

        for row in &rows[..11] {
            assert_eq!(row.principal, Decimal::ZERO);
            assert_eq!(row.total, dec!(41667));
            assert_eq!(row.remaining_balance, dec!(10_000_000));
        }
        assert_eq!(rows[11].principal, dec!(10_000_000));
        assert_eq!(rows[11].total, dec!(10_041_667));
        assert_eq!(rows[11].remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_amortize_zero_principal_is_all_zero() {
        let rows = amortize(RepaymentType::EqualInstallment, Decimal::ZERO, rate_5pct(), 4).unwrap();
        assert!(rows.iter().all(|r| r.total.is_zero() && r.remaining_balance.is_zero()));
    }

    #[test]
    fn test_amortize_rejects_oversized_term() {
        assert_eq!(
            amortize(RepaymentType::EqualPrincipal, dec!(100), dec!(0.01), 601),
            Err(AmortizationError::InvalidTerm(601))
        );
    }
}
