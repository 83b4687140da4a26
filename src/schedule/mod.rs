//! Payment schedule domain module
//!
//! Contains the schedule row models and the generator that turns loan terms
//! into a persisted repayment plan.

mod generator;
mod model;

pub use generator::{payment_date, ScheduleGenerator};
pub use model::*;
