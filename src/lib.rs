//! Loan Schedule Backend Library
//!
//! Amortization engine, payment schedule persistence, prepayment
//! recalculation and repayment analytics behind an HTTP API.

pub mod amortization;
pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod loan;
pub mod middleware;
pub mod models;
pub mod prepayment;
pub mod routes;
pub mod schedule;
pub mod scheduler;
pub mod state;
pub mod websocket;
