/// Password hashing and verification using Argon2id
use crate::error::{IdentityError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zxcvbn::zxcvbn;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MIN_ZXCVBN_SCORE: u8 = 3;

/// Hash a password using Argon2id algorithm
///
/// ## Security
///
/// - Algorithm: Argon2id (default configuration)
/// - Salt: Random 16-byte salt generated per password
/// - Password strength: composition rules and zxcvbn score >= 3, see
///   [`validate_password_strength`]
///
/// ## Returns
///
/// PHC-formatted hash string safe for database storage
pub fn hash_password(password: &str) -> Result<String> {
    validate_password_strength(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its hash
///
/// Comparison is constant time. Returns `false` on mismatch and an error
/// only when the stored hash itself is unusable.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| IdentityError::Internal(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(IdentityError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// [`hash_password`] on the blocking pool, Argon2 is deliberately slow
pub async fn hash_password_blocking(password: &str) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// [`verify_password`] on the blocking pool
pub async fn verify_password_blocking(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash)).await?
}

/// Validate password strength using composition rules and zxcvbn
///
/// ## Requirements
///
/// - 8 to 128 characters
/// - At least one uppercase letter
/// - At least one lowercase letter
/// - At least one digit
/// - At least one special character
/// - zxcvbn entropy score >= 3 (strong)
pub fn validate_password_strength(password: &str) -> Result<()> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::WeakPassword(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(IdentityError::WeakPassword(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_uppercase {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }

    if !has_lowercase {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }

    if !has_digit {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one digit".to_string(),
        ));
    }

    if !has_special {
        return Err(IdentityError::WeakPassword(
            "Password must contain at least one special character".to_string(),
        ));
    }

    let entropy = zxcvbn(password, &[]).map_err(|e| {
        IdentityError::Internal(format!("Password entropy calculation failed: {}", e))
    })?;

    if entropy.score() < MIN_ZXCVBN_SCORE {
        return Err(IdentityError::WeakPassword(
            "Password is too easy to guess, avoid common words and patterns".to_string(),
        ));
    }

    Ok(())
}
