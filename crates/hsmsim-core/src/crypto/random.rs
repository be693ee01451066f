//! Secure random key material.

use super::{force_odd_parity, CryptoError, Des3Key, KEY_LEN};

/// Draws `n` cryptographically random bytes from the OpenSSL CSPRNG.
///
/// # Errors
///
/// Returns [`CryptoError::Backend`] if the random source fails.
pub fn random_bytes(n: usize) -> Result<Vec<u8>, CryptoError> {
    let mut buf = vec![0u8; n];
    openssl::rand::rand_bytes(&mut buf)?;
    Ok(buf)
}

/// Generates a fresh double-length working key with odd parity per byte.
///
/// # Errors
///
/// Returns [`CryptoError::Backend`] if the random source fails.
pub fn generate_key() -> Result<Des3Key, CryptoError> {
    let mut material = random_bytes(KEY_LEN)?;
    force_odd_parity(&mut material);
    Des3Key::from_bytes(&material)
}
