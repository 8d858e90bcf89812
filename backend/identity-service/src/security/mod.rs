/// Security module for authentication and authorization
///
/// Provides core security primitives for identity-service:
/// - Password hashing and verification (Argon2id)
/// - Account lockout after repeated failed logins
/// - One-time email confirmation and password reset tokens
///
/// Session tokens and revocation live in the `jwt-security` library.
pub mod lockout;
pub mod one_time_token;
pub mod password;

pub use lockout::{FailureOutcome, LockoutGuard, LockoutPolicy};
pub use one_time_token::OneTimeToken;
pub use password::{hash_password, verify_password};
