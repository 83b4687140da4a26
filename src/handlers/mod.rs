//! API handlers

pub mod analytics;
pub mod health;
pub mod loan;
pub mod prepayment;

pub use analytics::*;
pub use health::*;
pub use loan::*;
pub use prepayment::*;

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::AuthenticatedUser;
