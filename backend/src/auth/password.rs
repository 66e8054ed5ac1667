use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{Error, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error as ThisError;

/// Minimum number of characters in a tenant password
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum PasswordPolicyViolation {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("password must not start or end with whitespace")]
    SurroundingWhitespace,
}

/// Checks a new tenant password; characters are counted, not bytes
pub fn check_password_policy(password: &str) -> Result<(), PasswordPolicyViolation> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyViolation::TooShort);
    }
    if password.trim() != password {
        return Err(PasswordPolicyViolation::SurroundingWhitespace);
    }
    Ok(())
}

/// Argon2id hash in PHC string form, with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(OsRng);
    let password_hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

/// `Ok(false)` on a wrong password, `Err` only when the stored hash is unusable
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(stored_hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

static UNKNOWN_TENANT_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no tenant has this password").ok());

/// Spends one verification on a throwaway hash so that logins for unknown
/// usernames take as long as logins with a wrong password.
pub fn verify_against_unknown_tenant(password: &str) {
    if let Some(hash) = UNKNOWN_TENANT_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}
