//! Credential primitives
//!
//! Argon2id password hashing for stored logins, and opaque bearer tokens
//! whose SHA-256 digest is what the database keeps.

use crate::error::{AppError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_SIZE: usize = 32; // 256 bits

/// Hash a password into a PHC string with a fresh random salt, on the
/// blocking pool.
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| AppError::Generic(format!("Password hashing task failed: {}", e)))?
}

/// Check a password against a stored PHC string, on the blocking pool.
///
/// A malformed stored hash is treated as a mismatch.
pub async fn verify_password(password: &str, stored_hash: &str) -> bool {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();

    match tokio::task::spawn_blocking(move || verify_blocking(&password, &stored_hash)).await {
        Ok(matches) => matches,
        Err(e) => {
            tracing::error!("Password verification task failed: {}", e);
            false
        }
    }
}

fn hash_blocking(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Generic(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

fn verify_blocking(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate a random bearer token, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest of a bearer token as stored in the database
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
