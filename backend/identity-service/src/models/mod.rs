/// Data models for identity and authentication
pub mod lockout;
pub mod user;

pub use lockout::{FailedLogin, Lockout};
pub use user::{PublicUser, User, DEFAULT_ROLE};
