//! HS256 session token codec
//!
//! Tokens use the standard compact JWT layout:
//! `base64url(header).base64url(payload).base64url(signature)` with the header
//! `{"alg":"HS256","typ":"JWT"}`, so third-party JWT libraries can verify them.

use crate::claims::Claims;
use crate::error::{Result, TokenError};
use crate::secret_validation::MIN_SECRET_LENGTH;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Encodes and verifies session tokens with a server-held secret.
///
/// Pure: the output depends only on the secret and the claims. Signature
/// comparison is constant time. There is no clock-skew leeway.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    header: Header,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec from raw secret bytes.
    ///
    /// Secrets shorter than 32 bytes are rejected here so a misconfigured
    /// server fails at startup rather than on the first request.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(TokenError::WeakSecret(secret.len()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            header: Header::new(Algorithm::HS256),
            validation,
        })
    }

    pub fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&self.header, claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify and decode a token.
    ///
    /// Fails with `MalformedToken` on structural problems, `SignatureMismatch`
    /// when the MAC differs and `Expired` when `now > exp`.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        if token.split('.').count() != 3 {
            return Err(TokenError::MalformedToken);
        }

        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.header.alg)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{TokenKind, TokenSubject};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::Utc;
    use uuid::Uuid;

    const TEST_SECRET: &[u8] = b"q7Vd9LmZ2xR4tWp8Kc3Nf6Hy1Bs5Ja0G";

    fn codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET).unwrap()
    }

    fn claims_issued_at(iat: i64, kind: TokenKind) -> Claims {
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            email: "test@example.com",
            role: "user",
            not_before: 0,
        };
        Claims::new(&subject, kind, iat)
    }

    fn fresh_claims() -> Claims {
        claims_issued_at(Utc::now().timestamp(), TokenKind::Credential)
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = TokenCodec::new(b"too-short-secret").unwrap_err();
        assert!(matches!(err, TokenError::WeakSecret(16)));
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        for kind in [TokenKind::Credential, TokenKind::Refresh] {
            let claims = claims_issued_at(Utc::now().timestamp(), kind);
            let token = codec.encode(&claims).unwrap();
            assert_eq!(codec.decode(&token).unwrap(), claims);
        }
    }

    #[test]
    fn test_compact_layout() {
        let token = codec().encode(&fresh_claims()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| !p.contains('=')));

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        for field in ["sub", "jti", "iat", "exp", "email", "role", "type"] {
            assert!(payload.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let codec = codec();
        let claims = fresh_claims();
        assert_eq!(codec.encode(&claims).unwrap(), codec.encode(&claims).unwrap());
    }

    #[test]
    fn test_expired_token_rejected_despite_valid_signature() {
        let codec = codec();
        let iat = Utc::now().timestamp() - 2 * 86_400;
        let token = codec
            .encode(&claims_issued_at(iat, TokenKind::Credential))
            .unwrap();

        assert!(matches!(codec.decode(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_any_signature_bit_flip_rejected() {
        let codec = codec();
        let token = codec.encode(&fresh_claims()).unwrap();
        let (message, signature) = token.rsplit_once('.').unwrap();
        let raw = URL_SAFE_NO_PAD.decode(signature).unwrap();

        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                let forged = format!("{}.{}", message, URL_SAFE_NO_PAD.encode(&tampered));

                assert!(
                    matches!(codec.decode(&forged), Err(TokenError::SignatureMismatch)),
                    "bit {bit} of byte {byte} accepted"
                );
            }
        }
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = codec();
        let token = codec.encode(&fresh_claims()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["role"] = serde_json::Value::from("admin");
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap()),
            parts[2]
        );

        assert!(matches!(
            codec.decode(&forged),
            Err(TokenError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = codec().encode(&fresh_claims()).unwrap();
        let other = TokenCodec::new(b"another-secret-that-is-32-bytes!").unwrap();
        assert!(matches!(
            other.decode(&token),
            Err(TokenError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec();
        let token = codec.encode(&fresh_claims()).unwrap();

        for bad in [
            "",
            "not-a-token",
            "a.b",
            "a.b.c.d",
            "!!!.@@@.###",
            &format!("{}.extra", token),
        ] {
            assert!(
                matches!(codec.decode(bad), Err(TokenError::MalformedToken)),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_unsigned_algorithm_rejected() {
        let codec = codec();
        let token = codec.encode(&fresh_claims()).unwrap();
        let (_, rest) = token.split_once('.').unwrap();
        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{}.{}", none_header, rest);

        assert!(matches!(
            codec.decode(&forged),
            Err(TokenError::MalformedToken)
        ));
    }
}
