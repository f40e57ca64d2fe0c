//! Password hashing (Argon2id, PHC string format)

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(String);

/// Hash a password with a fresh random salt
pub fn hash(raw: &str) -> Result<String, HashError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError(e.to_string()))?;

    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| HashError(e.to_string()))
}

/// Check a password against a stored digest; unparseable digests never match
pub fn verify(raw: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Digest checked when no account matches, so unknown emails cost one verify too
fn dummy_digest() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash("no-such-account").unwrap_or_default())
}

/// [`hash`] on the blocking pool
pub async fn hash_blocking(raw: &str) -> Result<String, HashError> {
    let raw = raw.to_string();
    tokio::task::spawn_blocking(move || hash(&raw))
        .await
        .map_err(|e| HashError(e.to_string()))?
}

/// [`verify`] on the blocking pool; `None` digest burns a verify against a dummy
pub async fn verify_blocking(raw: &str, digest: Option<&str>) -> Result<bool, HashError> {
    let raw = raw.to_string();
    let digest = digest.map(str::to_string);
    tokio::task::spawn_blocking(move || match digest {
        Some(digest) => verify(&raw, &digest),
        None => {
            verify(&raw, dummy_digest());
            false
        }
    })
    .await
    .map_err(|e| HashError(e.to_string()))
}
