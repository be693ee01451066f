//! Cardholder verification derivations.
//!
//! ISO format-0 PIN block handling plus the simulator's simplified PVV and
//! CVV-2 derivations. The derivations are intentionally not the genuine
//! VISA algorithms; they are the deterministic reductions the mimicked
//! device ships with, and test suites depend on their exact ordering.

mod cvv;
mod pinblock;
mod pvv;

pub use cvv::derive_cvv;
pub use pinblock::{encode_pin_block, extract_pin, PinError};
pub use pvv::derive_pvv;

use thiserror::Error;

use crate::crypto::CryptoError;

/// Errors from the PVV/CVV derivations.
#[derive(Debug, Error)]
pub enum DeriveError {
    /// The assembled input string contained a non-hex character.
    #[error("derivation input is not valid hex: {0}")]
    NonHexInput(#[from] hex::FromHexError),

    /// The cipher backend failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Scans `hex` left to right, keeps the first `n` decimal digits, and
/// right-pads with `'0'` when fewer exist.
fn decimalize(hex: &str, n: usize) -> String {
    let mut out: String = hex.chars().filter(char::is_ascii_digit).take(n).collect();
    while out.len() < n {
        out.push('0');
    }
    out
}

/// Right-pads `input` with `'0'` and truncates to 16 hex nibbles, then
/// interprets the result as 8 binary bytes.
fn sixteen_nibbles(input: &str) -> Result<Vec<u8>, DeriveError> {
    let mut padded = input.to_string();
    while padded.len() < 16 {
        padded.push('0');
    }
    padded.truncate(16);
    Ok(hex::decode(&padded)?)
}
