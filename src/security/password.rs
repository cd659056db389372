/// Password hashing and verification using Argon2id
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};

use crate::error::{AppError, Result};

/// Marker stored for accounts provisioned through a social sign-in.
/// It is not a parseable hash, so password verification always fails.
pub const UNUSABLE_PASSWORD: &str = "!";

/// Hash a password using Argon2id. Returns the PHC string for storage.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(rand::thread_rng());
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored hash. A stored value that is not a
/// valid PHC string (e.g. [`UNUSABLE_PASSWORD`]) never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let password = "letmein-please";
        let hash = hash_password(password).unwrap();
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn wrong_password_fails() {
        let hash = hash_password("letmein-please").unwrap();
        assert!(!verify_password("letmein-pretty-please", &hash));
    }

    #[test]
    fn unusable_hash_never_verifies() {
        assert!(!verify_password("anything", UNUSABLE_PASSWORD));
        assert!(!verify_password("", UNUSABLE_PASSWORD));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }
}
