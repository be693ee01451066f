//! Simplified card verification value.

use super::{decimalize, sixteen_nibbles, DeriveError};
use crate::crypto::Des3Key;

/// Derives the 3-digit CVV for a PAN/expiry/service-code triple under `cvk`.
///
/// The input string is `pan ‖ expiry ‖ service_code`, right-padded with
/// `'0'` to 16 nibbles and truncated to 16, then triple-DES encrypted under
/// the CVK. The CVV is the first three decimal digits of the hex
/// ciphertext, `'0'`-padded when fewer exist.
///
/// # Errors
///
/// Returns [`DeriveError`] when the assembled string is not hex or the
/// cipher fails.
pub fn derive_cvv(
    cvk: &Des3Key,
    pan: &str,
    expiry: &str,
    service_code: &str,
) -> Result<String, DeriveError> {
    let assembled = format!("{pan}{expiry}{service_code}");
    let block = sixteen_nibbles(&assembled)?;
    let ciphertext = cvk.encrypt(&block)?;
    Ok(decimalize(&hex::encode_upper(ciphertext), 3))
}
