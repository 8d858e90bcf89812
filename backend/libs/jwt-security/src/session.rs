//! Session token issuance, validation and revocation

use crate::claims::{Claims, TokenKind, TokenPair, TokenSubject};
use crate::codec::TokenCodec;
use crate::error::{Result, TokenError};
use crate::token_blacklist::{RevocationRecord, RevocationStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mints and checks session tokens against the shared revocation store.
///
/// Holds no per-user state. The logout-everywhere watermark lives with the
/// user record and is passed in through [`TokenSubject::not_before`] when
/// issuing and [`SessionManager::ensure_issued_after`] when validating.
#[derive(Clone)]
pub struct SessionManager {
    codec: Arc<TokenCodec>,
    revocations: Arc<dyn RevocationStore>,
}

impl SessionManager {
    pub fn new(codec: TokenCodec, revocations: Arc<dyn RevocationStore>) -> Self {
        Self {
            codec: Arc::new(codec),
            revocations,
        }
    }

    /// Issue an access/refresh pair for `subject` at the current time.
    pub fn issue_pair(&self, subject: &TokenSubject<'_>) -> Result<TokenPair> {
        self.issue_pair_at(subject, Utc::now().timestamp())
    }

    /// Issue a pair as of `now`.
    ///
    /// `iat` never precedes the subject's watermark, so tokens minted in the
    /// same second as a logout-everywhere stay valid.
    pub fn issue_pair_at(&self, subject: &TokenSubject<'_>, now: i64) -> Result<TokenPair> {
        let issued_at = now.max(subject.not_before);

        let access_claims = Claims::new(subject, TokenKind::Credential, issued_at);
        let refresh_claims = Claims::new(subject, TokenKind::Refresh, issued_at);

        let access_token = self.codec.encode(&access_claims)?;
        let refresh_token = self.codec.encode(&refresh_claims)?;

        debug!(
            user_id = %subject.user_id,
            access_jti = %access_claims.jti,
            refresh_jti = %refresh_claims.jti,
            "Issued token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_claims,
            refresh_claims,
        })
    }

    /// Decode `token`, require `expected` kind and reject revoked identifiers.
    ///
    /// A storage failure during the revocation lookup is returned as an
    /// error, never as "not revoked".
    pub async fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let claims = self.codec.decode(token)?;

        if claims.kind != expected {
            return Err(TokenError::WrongTokenKind {
                expected,
                actual: claims.kind,
            });
        }

        if !claims.has_consistent_lifetime() {
            warn!(jti = %claims.jti, "Token lifetime does not match its kind");
            return Err(TokenError::MalformedToken);
        }

        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    /// Reject tokens minted before the subject's last logout-everywhere.
    pub fn ensure_issued_after(&self, claims: &Claims, not_before: i64) -> Result<()> {
        if claims.iat < not_before {
            debug!(
                user_id = %claims.sub,
                jti = %claims.jti,
                iat = claims.iat,
                not_before,
                "Token predates session epoch"
            );
            return Err(TokenError::Revoked);
        }
        Ok(())
    }

    /// Revoke the token described by `claims` until its own expiry.
    ///
    /// Returns `true` when this call performed the revocation. The write runs
    /// on its own task so it completes even if the caller is dropped.
    pub async fn revoke(&self, claims: &Claims) -> Result<bool> {
        let record = RevocationRecord {
            token_id: claims.jti.clone(),
            user_id: claims.sub,
            expires_at: claims.exp,
        };
        let store = Arc::clone(&self.revocations);

        let created = tokio::spawn(async move { store.revoke(&record).await })
            .await
            .map_err(|e| TokenError::StorageUnavailable(format!("revocation task failed: {e}")))??;

        info!(user_id = %claims.sub, jti = %claims.jti, kind = %claims.kind, created, "Token revoked");
        Ok(created)
    }

    /// Drop expired revocation records from the backing store.
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.revocations.purge_expired().await?;
        if removed > 0 {
            info!(removed, "Purged expired revocation records");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_blacklist::MemoryRevocationStore;
    use async_trait::async_trait;
    use uuid::Uuid;

    const TEST_SECRET: &[u8] = b"session-test-secret-0123456789-abcdef";

    fn manager() -> SessionManager {
        SessionManager::new(
            TokenCodec::new(TEST_SECRET).unwrap(),
            Arc::new(MemoryRevocationStore::new()),
        )
    }

    fn subject(user_id: Uuid) -> TokenSubject<'static> {
        TokenSubject {
            user_id,
            email: "test@example.com",
            role: "user",
            not_before: 0,
        }
    }

    struct UnavailableStore;

    #[async_trait]
    impl RevocationStore for UnavailableStore {
        async fn revoke(&self, _record: &RevocationRecord) -> Result<bool> {
            Err(TokenError::StorageUnavailable("connection refused".into()))
        }

        async fn is_revoked(&self, _token_id: &str) -> Result<bool> {
            Err(TokenError::StorageUnavailable("connection refused".into()))
        }

        async fn purge_expired(&self) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_issue_and_validate_pair() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        let pair = manager.issue_pair(&subject(user_id)).unwrap();
        assert_ne!(pair.access_claims.jti, pair.refresh_claims.jti);
        assert_eq!(pair.expires_in(), 86_400);

        let access = manager
            .validate(&pair.access_token, TokenKind::Credential)
            .await
            .unwrap();
        assert_eq!(access.sub, user_id);
        assert!((access.exp - (now + 86_400)).abs() <= 2);

        let refresh = manager
            .validate(&pair.refresh_token, TokenKind::Refresh)
            .await
            .unwrap();
        assert!((refresh.exp - (now + 604_800)).abs() <= 2);
    }

    #[tokio::test]
    async fn test_wrong_kind_rejected() {
        let manager = manager();
        let pair = manager.issue_pair(&subject(Uuid::new_v4())).unwrap();

        assert!(matches!(
            manager.validate(&pair.refresh_token, TokenKind::Credential).await,
            Err(TokenError::WrongTokenKind {
                expected: TokenKind::Credential,
                actual: TokenKind::Refresh,
            })
        ));
        assert!(matches!(
            manager.validate(&pair.access_token, TokenKind::Refresh).await,
            Err(TokenError::WrongTokenKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_rejected() {
        let manager = manager();
        let pair = manager.issue_pair(&subject(Uuid::new_v4())).unwrap();

        assert!(manager.revoke(&pair.access_claims).await.unwrap());
        assert!(!manager.revoke(&pair.access_claims).await.unwrap());

        assert!(matches!(
            manager.validate(&pair.access_token, TokenKind::Credential).await,
            Err(TokenError::Revoked)
        ));
        // The sibling token is independently revocable
        assert!(manager
            .validate(&pair.refresh_token, TokenKind::Refresh)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let manager = manager();
        let issued = Utc::now().timestamp() - 86_400 - 10;
        let pair = manager.issue_pair_at(&subject(Uuid::new_v4()), issued).unwrap();

        assert!(matches!(
            manager.validate(&pair.access_token, TokenKind::Credential).await,
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_storage_failure_fails_closed() {
        let manager = SessionManager::new(
            TokenCodec::new(TEST_SECRET).unwrap(),
            Arc::new(UnavailableStore),
        );
        let pair = manager.issue_pair(&subject(Uuid::new_v4())).unwrap();

        assert!(matches!(
            manager.validate(&pair.access_token, TokenKind::Credential).await,
            Err(TokenError::StorageUnavailable(_))
        ));
        assert!(matches!(
            manager.revoke(&pair.access_claims).await,
            Err(TokenError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_watermark() {
        let manager = manager();
        let now = Utc::now().timestamp();
        let old = manager.issue_pair_at(&subject(Uuid::new_v4()), now).unwrap();

        let watermark = now + 1;
        assert!(matches!(
            manager.ensure_issued_after(&old.access_claims, watermark),
            Err(TokenError::Revoked)
        ));

        // Same-second reissue is aligned to the watermark
        let mut fresh_subject = subject(old.access_claims.sub);
        fresh_subject.not_before = watermark;
        let fresh = manager.issue_pair_at(&fresh_subject, now).unwrap();
        assert_eq!(fresh.access_claims.iat, watermark);
        assert!(manager
            .ensure_issued_after(&fresh.access_claims, watermark)
            .is_ok());
    }
}
