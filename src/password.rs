//! Secret hashing behind an injected port.
//!
//! The token service stores only a hash of each API-token secret and needs a
//! hasher it can also invoke against a dummy digest for its timing defense,
//! so hashing is a constructor-injected capability rather than a free
//! function.

use argon2::{
    password_hash::{
        rand_core::OsRng, Error as PasswordHashError, PasswordHash,
        PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HasherError {
    #[error("failed to hash secret: {0}")]
    Hash(String),
    #[error("invalid secret digest: {0}")]
    InvalidDigest(String),
}

/// Hashes and verifies opaque secrets.
///
/// `verify` returns `Ok(false)` on a mismatch; errors are reserved for
/// malformed digests and hasher failures.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, HasherError>;
    fn verify(&self, secret: &str, digest: &str) -> Result<bool, HasherError>;
}

/// Argon2id with the crate's secure defaults; the salt is generated per
/// hash and carried in the PHC string.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, HasherError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| HasherError::Hash(err.to_string()))
    }

    fn verify(&self, secret: &str, digest: &str) -> Result<bool, HasherError> {
        let parsed = PasswordHash::new(digest)
            .map_err(|err| HasherError::InvalidDigest(err.to_string()))?;
        match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(err) => Err(HasherError::InvalidDigest(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hasher = Argon2Hasher;
        let digest = hasher.hash("correct horse").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(hasher.verify("correct horse", &digest).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_secret_without_error() {
        let hasher = Argon2Hasher;
        let digest = hasher.hash("correct horse").unwrap();
        assert!(!hasher.verify("battery staple", &digest).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_digest() {
        let hasher = Argon2Hasher;
        assert!(matches!(
            hasher.verify("secret", "not-a-phc-string"),
            Err(HasherError::InvalidDigest(_))
        ));
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = Argon2Hasher;
        let first = hasher.hash("same secret").unwrap();
        let second = hasher.hash("same secret").unwrap();
        assert_ne!(first, second);
    }
}
