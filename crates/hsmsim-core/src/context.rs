//! Process-wide simulator state.
//!
//! The LMK and the policy flags are fixed at startup and immutable for the
//! life of the process; connections share them behind an `Arc` with no
//! further coordination.

use thiserror::Error;

use crate::crypto::{Des3Key, KEY_LEN};

/// The default LMK used when no key is configured.
pub const DEFAULT_LMK_HEX: &str = "deafbeedeafbeedeafbeedeafbeedeaf";

/// Errors raised while constructing the context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The configured LMK was not 32 hex characters.
    #[error("LMK must be 32 hex characters encoding 16 bytes: {0}")]
    InvalidLmk(String),
}

/// Behaviour toggles configured once at process start.
///
/// These mutate only error-code selection; they never change which
/// response code is emitted or which fields a response carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Policy {
    /// Skip odd-parity validation of recovered keys.
    pub skip_parity: bool,
    /// Report success where the device would report a verification or
    /// parity failure. The exact override set differs per command path.
    pub approve_all: bool,
}

impl Policy {
    /// Error-code override for the PIN-verification path (DC/EC/CA):
    /// verification, terminal-key parity, and PVK parity failures are all
    /// approved.
    #[must_use]
    pub fn apply_pin_path(&self, error: [u8; 2]) -> [u8; 2] {
        if self.approve_all && matches!(&error, b"01" | b"10" | b"11") {
            *b"00"
        } else {
            error
        }
    }

    /// Error-code override for the CVV path (CW/CY): only the
    /// verification mismatch is approved; a CVK parity failure is
    /// reported even under approve-all, matching the device.
    #[must_use]
    pub fn apply_cvv_path(&self, error: [u8; 2]) -> [u8; 2] {
        if self.approve_all && &error == b"01" {
            *b"00"
        } else {
            error
        }
    }

    /// Error-code override for key-management commands.
    #[must_use]
    pub fn apply_key_path(&self, error: [u8; 2]) -> [u8; 2] {
        if self.approve_all && matches!(&error, b"01" | b"10") {
            *b"00"
        } else {
            error
        }
    }
}

/// Immutable per-process HSM state: the LMK and the policy flags.
#[derive(Debug, Clone)]
pub struct HsmContext {
    lmk: Des3Key,
    policy: Policy,
}

impl HsmContext {
    /// Builds the context from a 32-hex-character LMK.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidLmk`] for anything that does not
    /// decode to exactly 16 bytes; the process must refuse to start in
    /// that case.
    pub fn new(lmk_hex: &str, policy: Policy) -> Result<Self, ContextError> {
        let material =
            hex::decode(lmk_hex).map_err(|e| ContextError::InvalidLmk(e.to_string()))?;
        if material.len() != KEY_LEN {
            return Err(ContextError::InvalidLmk(format!(
                "decoded to {} bytes",
                material.len()
            )));
        }
        let lmk = Des3Key::from_bytes(&material)
            .map_err(|e| ContextError::InvalidLmk(e.to_string()))?;
        Ok(Self { lmk, policy })
    }

    /// The local master key.
    #[must_use]
    pub fn lmk(&self) -> &Des3Key {
        &self.lmk
    }

    /// The configured policy flags.
    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}
