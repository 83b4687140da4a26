//! Schedule properties checked through the public API

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use loan_schedule_server::amortization::{amortize, monthly_rate, RepaymentType};
use loan_schedule_server::loan::LoanTerms;
use loan_schedule_server::schedule::{ScheduleGenerator, ScheduledPayment, SimulatedSchedule};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn build(
    amount: Decimal,
    rate: Decimal,
    term: u32,
    repayment_type: RepaymentType,
) -> Vec<ScheduledPayment> {
    ScheduleGenerator::build(&LoanTerms {
        amount,
        interest_rate: rate,
        term,
        repayment_type,
        start_date: date(2024, 1, 1),
        payment_day: 15,
    })
    .unwrap()
}

const SCENARIOS: [(Decimal, Decimal, u32); 6] = [
    (dec!(10_000_000), dec!(5), 12),
    (dec!(1_000), dec!(0), 7),
    (dec!(999_999), dec!(3.75), 36),
    (dec!(250_000_000), dec!(12.5), 360),
    (dec!(5), dec!(20), 12),
    (dec!(12_345_678), dec!(100), 600),
];

#[test]
fn test_principal_always_sums_to_amount() {
    for repayment_type in [
        RepaymentType::EqualInstallment,
        RepaymentType::EqualPrincipal,
        RepaymentType::BulletPayment,
    ] {
        for (amount, rate, term) in SCENARIOS {
            let rows = build(amount, rate, term, repayment_type);
            assert_eq!(rows.len(), term as usize);

            let principal: Decimal = rows.iter().map(|r| r.principal_amount).sum();
            assert_eq!(principal, amount, "{repayment_type} {amount} {rate}% {term}m");
            assert_eq!(rows.last().unwrap().remaining_balance, Decimal::ZERO);
            assert!(rows.iter().all(|r| r.remaining_balance >= Decimal::ZERO));
            assert!(rows
                .iter()
                .all(|r| r.total_amount == r.principal_amount + r.interest_amount));
        }
    }
}

#[test]
fn test_equal_installment_totals_are_level() {
    for (amount, rate, term) in SCENARIOS {
        let rows = build(amount, rate, term, RepaymentType::EqualInstallment);
        let first = rows[0].total_amount;
        for row in &rows[..rows.len() - 1] {
            assert!(
                (row.total_amount - first).abs() <= Decimal::ONE,
                "period {} drifted: {} vs {}",
                row.payment_number,
                row.total_amount,
                first
            );
        }
    }
}

#[test]
fn test_equal_principal_interest_never_increases() {
    for (amount, rate, term) in SCENARIOS {
        let rows = build(amount, rate, term, RepaymentType::EqualPrincipal);
        let first = rows[0].principal_amount;
        for pair in rows.windows(2) {
            assert!((pair[1].principal_amount - first).abs() <= Decimal::ONE);
            assert!(pair[1].interest_amount <= pair[0].interest_amount);
        }
    }
}

#[test]
fn test_bullet_repays_principal_in_final_period() {
    for (amount, rate, term) in SCENARIOS {
        let rows = build(amount, rate, term, RepaymentType::BulletPayment);
        let (last, head) = rows.split_last().unwrap();
        assert!(head.iter().all(|r| r.principal_amount.is_zero()));
        assert_eq!(last.principal_amount, amount);
    }
}

#[test]
fn test_reference_loan_equal_installment() {
    let rows = build(dec!(10_000_000), dec!(5), 12, RepaymentType::EqualInstallment);

    assert_eq!(rows.len(), 12);
    assert!((rows[0].total_amount - dec!(856_075)).abs() <= Decimal::ONE);
    assert_eq!(rows[0].payment_date, date(2024, 2, 15));
    assert_eq!(rows[11].payment_date, date(2025, 1, 15));
    assert_eq!(rows[11].remaining_balance, Decimal::ZERO);
}

#[test]
fn test_reference_loan_bullet() {
    let rows = build(dec!(10_000_000), dec!(5), 12, RepaymentType::BulletPayment);

    for row in &rows[..11] {
        assert!((row.total_amount - dec!(41_667)).abs() <= Decimal::ONE);
    }
    assert!((rows[11].total_amount - dec!(10_041_667)).abs() <= Decimal::ONE);
}

#[test]
fn test_month_end_anchor_clamps_without_drifting() {
    let rows = ScheduleGenerator::build(&LoanTerms {
        amount: dec!(1_200),
        interest_rate: dec!(6),
        term: 4,
        repayment_type: RepaymentType::EqualPrincipal,
        start_date: date(2024, 1, 31),
        payment_day: 31,
    })
    .unwrap();

    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.payment_date).collect();
    assert_eq!(
        dates,
        vec![
            date(2024, 2, 29),
            date(2024, 3, 31),
            date(2024, 4, 30),
            date(2024, 5, 31),
        ]
    );
}

#[test]
fn test_simulated_totals() {
    let rows = build(dec!(10_000_000), dec!(5), 12, RepaymentType::BulletPayment);
    let summary = SimulatedSchedule::from(rows);

    assert_eq!(summary.total_principal, dec!(10_000_000));
    assert_eq!(summary.total_interest, dec!(41_667) * dec!(12));
    assert_eq!(summary.total_amount, summary.total_principal + summary.total_interest);
}

#[test]
fn test_amortize_is_deterministic() {
    let a = amortize(RepaymentType::EqualInstallment, dec!(777_777), monthly_rate(dec!(4.2)), 48)
        .unwrap();
    let b = amortize(RepaymentType::EqualInstallment, dec!(777_777), monthly_rate(dec!(4.2)), 48)
        .unwrap();
    assert_eq!(a, b);
}
