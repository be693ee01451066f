//! Cryptographic primitives for the simulator.
//!
//! Everything here is deliberately scoped to what the wire protocol needs:
//! two-key triple-DES in ECB mode without padding, odd-parity handling for
//! DES key material, key check values, and a secure random source for key
//! generation. The backend is OpenSSL throughout.
//!
//! These primitives are stateless per call; the only long-lived key object
//! is the LMK held by [`crate::context::HsmContext`].

mod des3;
mod kcv;
mod parity;
mod random;

pub use des3::{Des3Key, BLOCK_LEN, KEY_LEN};
pub use kcv::key_check_value;
pub use parity::{check_odd_parity, force_odd_parity, is_odd_parity};
pub use random::{generate_key, random_bytes};

use thiserror::Error;

/// Errors from the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material had a length the cipher cannot use.
    #[error("invalid key length {0}, expected 8 or 16 bytes")]
    InvalidKeyLength(usize),

    /// Input was empty or not a multiple of the DES block size.
    #[error("input length {0} is not block aligned")]
    BlockAlignment(usize),

    /// The OpenSSL backend rejected the operation.
    #[error("cipher backend error: {0}")]
    Backend(#[from] openssl::error::ErrorStack),
}
