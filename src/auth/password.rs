/// Password Hashing and Verification
///
/// bcrypt with a fixed work factor (`DEFAULT_COST`). Each call draws a
/// fresh 16-byte random salt, which bcrypt embeds in the returned string
/// alongside the derived bytes, so the single stored value is all that
/// verification needs.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

/// Hash a password for storage.
///
/// # Errors
/// Returns error only if the underlying derivation fails; password
/// content is not inspected here (input policy belongs to the caller).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its stored hash.
///
/// Comparison of the re-derived bytes is constant-time inside bcrypt.
/// A malformed stored hash (wrong length or encoding) is treated as a
/// plain verification failure rather than an error, so nothing about
/// the stored value leaks to the caller.
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    verify(password, stored_hash).unwrap_or(false)
}
