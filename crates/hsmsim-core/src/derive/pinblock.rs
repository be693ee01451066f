//! ISO format-0 PIN blocks.
//!
//! The block is eight bytes read as sixteen hex nibbles: nibble 0 is the
//! PIN length, nibbles 1..=N are the PIN digits, the rest is `F` padding.
//! This simulator's decoding does not XOR the account number into the
//! block; the account participates only in the verification-value strings.

use thiserror::Error;

/// Errors raised while decoding or encoding a PIN block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PinError {
    /// The clear block was not exactly 8 bytes.
    #[error("PIN block is {0} bytes, expected 8")]
    InvalidBlockLength(usize),

    /// The length nibble was outside 4..=12.
    #[error("PIN length {0} outside the allowed 4..=12 range")]
    InvalidPinLength(usize),

    /// A PIN position held a non-decimal nibble.
    #[error("PIN contains non-digit nibble '{0}'")]
    InvalidDigit(char),
}

/// Extracts the clear PIN digits from a decrypted format-0 block.
///
/// # Errors
///
/// Returns [`PinError`] when the block length, PIN length nibble, or any
/// PIN digit is invalid.
pub fn extract_pin(block: &[u8]) -> Result<String, PinError> {
    if block.len() != 8 {
        return Err(PinError::InvalidBlockLength(block.len()));
    }

    let nibbles = hex::encode_upper(block);
    let mut chars = nibbles.chars();
    let length_nibble = chars.next().unwrap_or('0');
    let pin_len = length_nibble.to_digit(16).unwrap_or(0) as usize;
    if !(4..=12).contains(&pin_len) {
        return Err(PinError::InvalidPinLength(pin_len));
    }

    let pin: String = chars.take(pin_len).collect();
    if let Some(bad) = pin.chars().find(|c| !c.is_ascii_digit()) {
        return Err(PinError::InvalidDigit(bad));
    }
    Ok(pin)
}

/// Encodes clear PIN digits into a format-0 block with `F` padding.
///
/// # Errors
///
/// Returns [`PinError`] when the PIN length or a digit is invalid.
pub fn encode_pin_block(pin: &str) -> Result<[u8; 8], PinError> {
    if !(4..=12).contains(&pin.len()) {
        return Err(PinError::InvalidPinLength(pin.len()));
    }
    if let Some(bad) = pin.chars().find(|c| !c.is_ascii_digit()) {
        return Err(PinError::InvalidDigit(bad));
    }

    let mut nibbles = format!("{:X}{pin}", pin.len());
    while nibbles.len() < 16 {
        nibbles.push('F');
    }

    let mut block = [0u8; 8];
    let decoded = hex::decode(&nibbles).expect("nibble string is valid hex");
    block.copy_from_slice(&decoded);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_four_digit_pin() {
        let block = [0x04, 0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(extract_pin(&block).unwrap(), "1234");
    }

    #[test]
    fn test_extract_twelve_digit_pin() {
        let block = [0x0C, 0x98, 0x76, 0x54, 0x32, 0x10, 0x12, 0x3F];
        assert_eq!(extract_pin(&block).unwrap(), "987654321012");
    }

    #[test]
    fn test_length_nibble_bounds() {
        let short = [0x03, 0x12, 0x3F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(extract_pin(&short), Err(PinError::InvalidPinLength(3)));

        let long = [0x0D, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x3F];
        assert_eq!(extract_pin(&long), Err(PinError::InvalidPinLength(13)));
    }

    #[test]
    fn test_non_digit_pin_nibble_rejected() {
        let block = [0x04, 0x1A, 0x34, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(extract_pin(&block), Err(PinError::InvalidDigit('A')));
    }

    #[test]
    fn test_wrong_block_length_rejected() {
        assert_eq!(extract_pin(&[0u8; 7]), Err(PinError::InvalidBlockLength(7)));
    }

    #[test]
    fn test_encode_extract_roundtrip() {
        for pin in ["1234", "0000", "999999999999", "4711"] {
            let block = encode_pin_block(pin).unwrap();
            assert_eq!(extract_pin(&block).unwrap(), pin);
        }
    }

    #[test]
    fn test_encode_pads_with_f() {
        let block = encode_pin_block("1234").unwrap();
        assert_eq!(block, [0x04, 0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
