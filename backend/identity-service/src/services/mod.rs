/// Business logic for identity service
pub mod authentication;

pub use authentication::{AuthenticationFlow, Registration};
