use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password does not match hash")]
    Mismatch,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Opaque password hashing capability.
pub trait PasswordHasher: Send + Sync {
    fn generate(&self, password: &str) -> Result<String, PasswordError>;
    fn validate(&self, password: &str, hash: &str) -> Result<(), PasswordError>;
}

#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn generate(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                PasswordError::Hash(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn validate(&self, password: &str, hash: &str) -> Result<(), PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            PasswordError::Hash(e.to_string())
        })?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(()),
            Err(password_hash::Error::Password) => Err(PasswordError::Mismatch),
            Err(e) => Err(PasswordError::Hash(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_validate_roundtrip() {
        let hasher = Argon2Hasher;
        let hash = hasher.generate("Qwerty123!").expect("hashing should succeed");
        assert_ne!(hash, "Qwerty123!");
        assert!(hasher.validate("Qwerty123!", &hash).is_ok());
    }

    #[test]
    fn validate_reports_mismatch() {
        let hasher = Argon2Hasher;
        let hash = hasher
            .generate("correct-horse-battery-staple")
            .expect("hashing should succeed");
        assert!(matches!(
            hasher.validate("wrong-password", &hash),
            Err(PasswordError::Mismatch)
        ));
    }

    #[test]
    fn validate_errors_on_malformed_hash() {
        let err = Argon2Hasher
            .validate("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(matches!(err, PasswordError::Hash(_)));
    }
}
