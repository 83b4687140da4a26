//! Loan progress analytics
//!
//! [`ProgressAnalyzer`] is a pure read-side aggregation over schedule rows;
//! [`AnalyticsService`] loads rows and stores point-in-time snapshots.

mod model;
mod progress;
mod service;

pub use model::*;
pub use progress::{LoanProgress, ProgressAnalyzer};
pub use service::AnalyticsService;
