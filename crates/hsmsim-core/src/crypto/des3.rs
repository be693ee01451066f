//! Two-key triple-DES in ECB mode, no padding.
//!
//! Working keys on this protocol are 16 bytes, treated as halves (K1, K2)
//! with K1 reused as the third subkey. OpenSSL only exposes the three-key
//! EDE3 cipher, so the key is expanded to K1‖K2‖K1 before each operation.

use openssl::symm::{Cipher, Crypter, Mode};

use super::CryptoError;

/// DES block size in bytes.
pub const BLOCK_LEN: usize = 8;

/// Double-length key size in bytes.
pub const KEY_LEN: usize = 16;

/// A double-length (2-key) triple-DES key.
///
/// Single-length 8-byte material is accepted and doubled (K‖K), which makes
/// the cipher degenerate to single DES; the behaviour legacy terminal
/// master keys rely on.
#[derive(Clone)]
pub struct Des3Key {
    key: [u8; KEY_LEN],
}

impl Des3Key {
    /// Builds a key from 8 or 16 bytes of material.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] for any other length.
    pub fn from_bytes(material: &[u8]) -> Result<Self, CryptoError> {
        let mut key = [0u8; KEY_LEN];
        match material.len() {
            KEY_LEN => key.copy_from_slice(material),
            BLOCK_LEN => {
                key[..BLOCK_LEN].copy_from_slice(material);
                key[BLOCK_LEN..].copy_from_slice(material);
            },
            other => return Err(CryptoError::InvalidKeyLength(other)),
        }
        Ok(Self { key })
    }

    /// Raw double-length key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Encrypts block-aligned data.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::BlockAlignment`] for empty or unaligned input,
    /// or [`CryptoError::Backend`] if OpenSSL fails.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.ecb(Mode::Encrypt, data)
    }

    /// Decrypts block-aligned data.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Des3Key::encrypt`].
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.ecb(Mode::Decrypt, data)
    }

    fn ecb(&self, mode: Mode, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.is_empty() || data.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::BlockAlignment(data.len()));
        }

        // K1 ‖ K2 ‖ K1 for the three-key EDE3 cipher.
        let mut expanded = [0u8; 24];
        expanded[..KEY_LEN].copy_from_slice(&self.key);
        expanded[KEY_LEN..].copy_from_slice(&self.key[..BLOCK_LEN]);

        let cipher = Cipher::des_ede3();
        let mut crypter = Crypter::new(cipher, mode, &expanded, None)?;
        crypter.pad(false);

        let mut out = vec![0u8; data.len() + cipher.block_size()];
        let mut written = crypter.update(data, &mut out)?;
        written += crypter.finalize(&mut out[written..])?;
        out.truncate(written);
        Ok(out)
    }
}

impl std::fmt::Debug for Des3Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never reaches logs.
        f.write_str("Des3Key(..)")
    }
}
