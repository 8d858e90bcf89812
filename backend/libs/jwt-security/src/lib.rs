//! Session token security library
//!
//! **Features**:
//! - HS256 token codec with a startup-checked signing secret
//! - Access/refresh token pairs with fixed lifetimes (24h / 7d)
//! - JWT ID (jti) revocation registry, in-memory or Redis
//! - Signing secret strength validation

pub mod claims;
pub mod codec;
pub mod error;
pub mod secret_validation;
pub mod session;
pub mod token_blacklist;

#[cfg(test)]
mod test_utils;

pub use claims::{
    Claims, TokenKind, TokenPair, TokenSubject, ACCESS_TOKEN_LIFETIME_SECS,
    REFRESH_TOKEN_LIFETIME_SECS,
};
pub use codec::TokenCodec;
pub use error::{Result, TokenError};
pub use secret_validation::{validate_secret_strength, SecretStrength, MIN_SECRET_LENGTH};
pub use session::SessionManager;
pub use token_blacklist::{
    MemoryRevocationStore, RedisRevocationStore, RevocationRecord, RevocationStore,
};
