//! Password hashing with PBKDF2-HMAC-SHA256 (ring).
//!
//! Hashes are stored as `base64(salt):base64(hash)` strings, using
//! 600,000 iterations per OWASP 2023 recommendations.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::rand::{SecureRandom, SystemRandom};
use ring::pbkdf2;

use crate::error::{StoreError, StoreResult};

/// PBKDF2-HMAC-SHA256 with 600,000 iterations (OWASP 2023).
const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(600_000) {
    Some(n) => n,
    None => unreachable!(),
};

const SALT_LEN: usize = 32;

const KEY_LEN: usize = 32;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Hash a password and return a storable string of the form `base64(salt):base64(hash)`.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| StoreError::InvalidArgument("failed to generate random salt".into()))?;

    let mut hash = [0u8; KEY_LEN];
    pbkdf2::derive(
        PBKDF2_ALG,
        PBKDF2_ITERATIONS,
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok(format!("{}:{}", BASE64.encode(salt), BASE64.encode(hash)))
}

/// Verify a password against a stored hash string (`base64(salt):base64(hash)`).
pub fn verify_password(password: &str, stored: &str) -> StoreResult<bool> {
    let (salt, expected) = stored
        .split_once(':')
        .ok_or_else(|| StoreError::InvalidArgument("malformed password hash".into()))?;

    let salt = BASE64
        .decode(salt)
        .map_err(|e| StoreError::InvalidArgument(format!("invalid salt encoding: {e}")))?;
    let expected = BASE64
        .decode(expected)
        .map_err(|e| StoreError::InvalidArgument(format!("invalid hash encoding: {e}")))?;

    Ok(pbkdf2::verify(
        PBKDF2_ALG,
        PBKDF2_ITERATIONS,
        &salt,
        password.as_bytes(),
        &expected,
    )
    .is_ok())
}

/// Compare a plaintext password with a stored plaintext value.
///
/// Runs over every byte of equal-length inputs regardless of where they
/// first differ.
pub fn verify_plaintext(password: &str, stored: &str) -> bool {
    let (a, b) = (password.as_bytes(), stored.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ── tests ────────────────────────────────────────────────────────────
