//! Loan domain module
//!
//! Contains the loan models, lifecycle events and the service that creates
//! loans together with their schedules.

mod model;
mod service;

pub use model::*;
pub(crate) use service::{fetch_schedule, find_loan, lock_loan};
pub use service::{apply_payment, LoanService, PaymentOutcome};
