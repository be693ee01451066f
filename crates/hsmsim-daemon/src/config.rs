//! Daemon configuration.
//!
//! Values come from an optional TOML file with command-line flags taking
//! precedence, and are frozen into [`SimulatorConfig`] before the server
//! starts. Nothing here is mutable afterwards.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use hsmsim_core::context::DEFAULT_LMK_HEX;

/// Default TCP port the simulator listens on.
pub const DEFAULT_PORT: u16 = 1500;

/// Optional on-disk configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// TCP port to listen on.
    pub port: Option<u16>,
    /// LMK as 32 hex characters.
    pub lmk: Option<String>,
    /// Message header every frame must carry, as a literal string.
    pub header: Option<String>,
    /// Enable frame and field tracing.
    pub debug: Option<bool>,
    /// Skip odd-parity validation of recovered keys.
    pub skip_parity: Option<bool>,
    /// Report success where the device would report a failure.
    pub approve_all: Option<bool>,
}

impl ConfigFile {
    /// Loads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Resolved, immutable simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// LMK as 32 hex characters; validated by the core at startup.
    pub lmk_hex: String,
    /// Raw header bytes, empty when no header is configured.
    pub header: Vec<u8>,
    /// Frame and field tracing.
    pub debug: bool,
    /// Skip odd-parity validation.
    pub skip_parity: bool,
    /// Approve-all policy.
    pub approve_all: bool,
}

impl SimulatorConfig {
    /// Merges the config file (if any) with command-line overrides.
    /// Flags win over the file; built-in defaults fill the rest.
    #[must_use]
    pub fn resolve(
        file: &ConfigFile,
        port: Option<u16>,
        lmk: Option<String>,
        header: Option<String>,
        debug: bool,
        skip_parity: bool,
        approve_all: bool,
    ) -> Self {
        Self {
            port: port.or(file.port).unwrap_or(DEFAULT_PORT),
            lmk_hex: lmk
                .or_else(|| file.lmk.clone())
                .unwrap_or_else(|| DEFAULT_LMK_HEX.to_string()),
            header: header
                .or_else(|| file.header.clone())
                .unwrap_or_default()
                .into_bytes(),
            debug: debug || file.debug.unwrap_or(false),
            skip_parity: skip_parity || file.skip_parity.unwrap_or(false),
            approve_all: approve_all || file.approve_all.unwrap_or(false),
        }
    }
}
