//! Password hashing and verification
//!
//! Passwords are hashed with Argon2id and stored as PHC strings. Each hash
//! embeds its own random salt, so hashing the same password twice yields two
//! different strings that both verify.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::error::HashError;

/// Longest plaintext accepted, in bytes
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// Well-formed argon2id hash of no real password
///
/// Carries the same parameters `hash_password` uses, so verifying against it
/// costs as much as verifying a stored member hash. Login checks unknown
/// usernames against it.
pub const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$I9S7WSfHlI4H+AG7+tneiw$Qzi0PgH/6CwSOii1mpvMM5q7NUrXxuyo20FU/8wN/PM";

/// Hash a password using Argon2id
///
/// # Errors
///
/// Returns `HashError::InputTooLong` above `MAX_PASSWORD_BYTES`, and
/// `HashError::HashFailed` if the hasher itself fails.
///
/// # Example
///
/// ```
/// use membership_service::auth::password::hash_password;
///
/// let hash = hash_password("pw1").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(plaintext: &str) -> Result<String, HashError> {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return Err(HashError::InputTooLong(MAX_PASSWORD_BYTES));
    }

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::HashFailed(e.to_string()))
}

/// Verify a password against a stored hash
///
/// Returns `Ok(false)` on a mismatch. A stored value that is not a PHC
/// string yields `HashError::MalformedHash`; callers treat that as a
/// mismatch.
///
/// # Example
///
/// ```
/// use membership_service::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("pw1").unwrap();
/// assert!(verify_password("pw1", &hash).unwrap());
/// assert!(!verify_password("pw2", &hash).unwrap());
/// ```
pub fn verify_password(plaintext: &str, hash: &str) -> Result<bool, HashError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| HashError::MalformedHash)?;

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(_) => Err(HashError::MalformedHash),
    }
}
