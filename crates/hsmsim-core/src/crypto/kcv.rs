//! Key check values.

use super::{CryptoError, Des3Key};

/// Derives the key check value of `key` at `n` bytes.
///
/// A 16-byte zero buffer is encrypted and the leading `n` bytes of the
/// ciphertext are returned as raw bytes. Callers use `n` of 6 or 16; the
/// 16-byte form exists because the device this simulator mirrors emits a
/// full-width check value on its KCV command.
///
/// # Errors
///
/// Returns [`CryptoError::Backend`] if the cipher backend fails.
pub fn key_check_value(key: &Des3Key, n: usize) -> Result<Vec<u8>, CryptoError> {
    let mut kcv = key.encrypt(&[0u8; 16])?;
    kcv.truncate(n);
    Ok(kcv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kcv_prefix_property() {
        let key = Des3Key::from_bytes(&[0x97; 16]).unwrap();
        let short = key_check_value(&key, 6).unwrap();
        let long = key_check_value(&key, 16).unwrap();
        assert_eq!(short.len(), 6);
        assert_eq!(long.len(), 16);
        assert_eq!(&long[..6], &short[..]);
    }

    #[test]
    fn test_kcv_matches_zero_block_encryption() {
        let key = Des3Key::from_bytes(&[0x31; 16]).unwrap();
        let direct = key.encrypt(&[0u8; 8]).unwrap();
        let kcv = key_check_value(&key, 6).unwrap();
        assert_eq!(&kcv[..], &direct[..6]);
    }

    #[test]
    fn test_kcv_deterministic() {
        let key = Des3Key::from_bytes(&[0x55; 16]).unwrap();
        assert_eq!(
            key_check_value(&key, 16).unwrap(),
            key_check_value(&key, 16).unwrap()
        );
    }
}
