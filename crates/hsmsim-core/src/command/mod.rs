//! Per-command message grammar.
//!
//! Every supported command has a deterministic, sequential parse over its
//! payload. Field boundaries are discovered by exactly three mechanisms:
//!
//! 1. fixed widths (key-type codes, PIN blocks, expiry dates, ...);
//! 2. a one-byte look-ahead for key-scheme sentinels (`U`/`T`/`S`/`X`)
//!    that widen a key field to its 33-byte envelope form;
//! 3. a delimiter scan for `;`.
//!
//! The parser only partitions bytes into named fields; it never
//! interprets semantics. Length-flag bytes are stored verbatim for the
//! handlers to consult. Trailing unread payload bytes are ignored
//! silently, matching the tolerance of the device being simulated.

mod cursor;
mod fields;
mod grammar;

pub use cursor::Cursor;
pub use fields::FieldMap;
pub use grammar::{parse_request, Request};

use thiserror::Error;

/// Errors from the per-command payload grammar.
///
/// Any of these is fatal to the connection: the session layer closes the
/// socket without a reply, because a peer that framed a known command
/// incorrectly cannot be resynchronised in-band.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// A required delimiter was absent from the remaining payload.
    #[error("malformed {command} command: missing '{delimiter}' delimiter")]
    MalformedCommand {
        /// Command being parsed.
        command: &'static str,
        /// The delimiter that was expected.
        delimiter: char,
    },

    /// A field ran past the end of the payload.
    #[error("field '{field}' truncated: wanted {wanted} bytes, {available} left")]
    ShortField {
        /// Name of the truncated field.
        field: &'static str,
        /// Bytes the field needed.
        wanted: usize,
        /// Bytes remaining in the payload.
        available: usize,
    },
}
