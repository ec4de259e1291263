//! Credential collaborators consumed by the authentication use cases.
//!
//! Password hashing ships with an Argon2 implementation. Token issuance is
//! an opaque interface; the transport layer provides the implementation.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use common::{AppError, AppResult};
use domain::{User, MIN_PASSWORD_LENGTH};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Hashes and verifies user passwords.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain_text: &str) -> AppResult<String>;

    /// `false` for a wrong password or an unreadable hash.
    fn verify(&self, plain_text: &str, hash: &str) -> bool;
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    #[inline]
    fn argon2() -> Argon2<'static> {
        Argon2::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plain_text: &str) -> AppResult<String> {
        if plain_text.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = Self::argon2()
            .hash_password(plain_text.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Password hash failed: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plain_text: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Self::argon2()
                .verify_password(plain_text.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("Unreadable password hash: {}", e);
                false
            }
        }
    }
}

/// Tokens handed to a client after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    /// Raw refresh token; only its hash is stored
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues access and refresh tokens.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user: &User) -> AppResult<IssuedTokens>;

    /// Deterministic digest used to look a refresh token up again.
    fn hash_refresh_token(&self, raw: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2Hasher;
        let hash = hasher.hash("SecurePassword123!").unwrap();

        assert!(hasher.verify("SecurePassword123!", &hash));
        assert!(!hasher.verify("WrongPassword123", &hash));
    }

    #[test]
    fn test_same_password_different_salts() {
        let hasher = Argon2Hasher;
        let first = hasher.hash("SamePassword123").unwrap();
        let second = hasher.hash("SamePassword123").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            Argon2Hasher.hash("short"),
            Err(AppError::Validation(_))
        ));
        assert!(Argon2Hasher.hash("12345678").is_ok());
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!Argon2Hasher.verify("anything", "not-a-phc-string"));
    }
}
