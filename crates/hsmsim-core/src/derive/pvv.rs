//! Simplified PIN verification value.

use super::{decimalize, sixteen_nibbles, DeriveError};
use crate::crypto::Des3Key;

/// Derives the 4-digit PVV for an account/PVKI/PIN triple under `pvk`.
///
/// The input string is `account ‖ pvki ‖ first-4-PIN-digits`, right-padded
/// with `'0'` to 16 nibbles and truncated to 16, then triple-DES encrypted
/// under the PVK pair. The PVV is the first four decimal digits of the hex
/// ciphertext, `'0'`-padded when fewer exist.
///
/// # Errors
///
/// Returns [`DeriveError`] when the assembled string is not hex or the
/// cipher fails.
pub fn derive_pvv(
    pvk: &Des3Key,
    account: &str,
    pvki: &str,
    pin: &str,
) -> Result<String, DeriveError> {
    let pin4 = &pin[..pin.len().min(4)];
    let assembled = format!("{account}{pvki}{pin4}");
    let block = sixteen_nibbles(&assembled)?;
    let ciphertext = pvk.encrypt(&block)?;
    Ok(decimalize(&hex::encode_upper(ciphertext), 4))
}
