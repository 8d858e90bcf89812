//! Session token claims and token kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Access tokens live 24 hours
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 24 * 3600;
/// Refresh tokens live 7 days
pub const REFRESH_TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 3600;

/// Declared purpose of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Access token, authorizes resource requests
    #[serde(rename = "credential")]
    Credential,
    /// Refresh token, only exchangeable for a new pair
    #[serde(rename = "refresh")]
    Refresh,
}

impl TokenKind {
    /// Fixed lifetime for tokens of this kind. Callers never choose expiry.
    pub fn lifetime_secs(self) -> i64 {
        match self {
            TokenKind::Credential => ACCESS_TOKEN_LIFETIME_SECS,
            TokenKind::Refresh => REFRESH_TOKEN_LIFETIME_SECS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Credential => "credential",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a session token
///
/// Field names match the wire format: `sub`, `jti`, `iat`, `exp`, `email`,
/// `role`, `type`. Timestamps are Unix seconds (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Unique token identifier, independently revocable
    pub jti: String,
    /// Issued at
    pub iat: i64,
    /// Expiration, always `iat + kind.lifetime_secs()`
    pub exp: i64,
    /// Email snapshot for authorization without a lookup
    #[serde(default)]
    pub email: String,
    /// Role snapshot
    #[serde(default)]
    pub role: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

impl Claims {
    /// Build claims for `subject` with a fresh random token identifier.
    pub fn new(subject: &TokenSubject<'_>, kind: TokenKind, issued_at: i64) -> Self {
        Self {
            sub: subject.user_id,
            jti: Uuid::new_v4().to_string(),
            iat: issued_at,
            exp: issued_at + kind.lifetime_secs(),
            email: subject.email.to_string(),
            role: subject.role.to_string(),
            kind,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.exp
    }

    /// The expiry invariant holds for every token this service mints.
    pub(crate) fn has_consistent_lifetime(&self) -> bool {
        self.exp - self.iat == self.kind.lifetime_secs()
    }
}

/// What the session layer needs to know about a user to mint tokens
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub role: &'a str,
    /// Earliest acceptable `iat` for this user (logout-everywhere watermark)
    pub not_before: i64,
}

/// Access and refresh token minted together at login or refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    #[serde(rename = "session")]
    pub access_token: String,
    #[serde(rename = "refresh")]
    pub refresh_token: String,
    #[serde(skip)]
    pub access_claims: Claims,
    #[serde(skip)]
    pub refresh_claims: Claims,
}

impl TokenPair {
    /// Seconds until the access token expires
    pub fn expires_in(&self) -> i64 {
        self.access_claims.exp - self.access_claims.iat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject<'static> {
        TokenSubject {
            user_id: Uuid::new_v4(),
            email: "test@example.com",
            role: "user",
            not_before: 0,
        }
    }

    #[test]
    fn test_expiry_is_fixed_per_kind() {
        let access = Claims::new(&subject(), TokenKind::Credential, 1_000);
        let refresh = Claims::new(&subject(), TokenKind::Refresh, 1_000);

        assert_eq!(access.exp, 1_000 + 86_400);
        assert_eq!(refresh.exp, 1_000 + 604_800);
        assert!(access.has_consistent_lifetime());
        assert!(refresh.has_consistent_lifetime());
    }

    #[test]
    fn test_kind_wire_names() {
        let claims = Claims::new(&subject(), TokenKind::Credential, 1_000);
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["type"], "credential");
        assert_eq!(json["iat"], 1_000);
        assert!(json.get("sub").is_some());
        assert!(json.get("jti").is_some());
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_expired_at_boundary() {
        let claims = Claims::new(&subject(), TokenKind::Credential, 1_000);
        assert!(!claims.is_expired_at(claims.exp));
        assert!(claims.is_expired_at(claims.exp + 1));
    }
}
