//! Authentication module
//!
//! Verifies bearer JWTs issued by the identity provider. The `sub` claim
//! carries the requesting user's id.

mod jwt;

pub use jwt::{issue_token, verify_token, Claims, JwtError, JwtKeys};
