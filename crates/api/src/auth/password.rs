//! Argon2id password hashing and verification.
//!
//! Hashes are stored in PHC string format, so algorithm parameters and salt
//! travel with the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use natours_core::types::Document;

/// Hash a plaintext password with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only for malformed hashes.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether the user changed their password after a token issued at
/// `issued_at` (Unix seconds).
pub fn changed_password_after(user: &Document, issued_at: i64) -> bool {
    user.get("passwordChangedAt")
        .and_then(|v| v.as_str())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .is_some_and(|changed| changed.timestamp() > issued_at)
}

/// Timestamp recorded on a password change. Backdated one second so a token
/// issued in the same second as the change stays valid.
pub fn password_changed_now() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("pass1234").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"), "expected argon2id PHC prefix");
        assert!(verify_password("pass1234", &hash).expect("verify should succeed"));
        assert!(!verify_password("wrong-password", &hash).expect("verify should succeed"));
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("pass1234", "not-a-hash").is_err());
    }

    #[test]
    fn test_password_change_against_token_age() {
        let user = json!({ "passwordChangedAt": "2024-05-01T12:00:00.000Z" })
            .as_object()
            .cloned()
            .unwrap();
        let changed = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .timestamp();

        assert!(changed_password_after(&user, changed - 60));
        assert!(!changed_password_after(&user, changed + 60));
        assert!(!changed_password_after(&Document::new(), changed));
    }
}
