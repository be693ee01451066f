//! Length-prefixed frame codec for the host protocol.
//!
//! Each frame consists of:
//!
//! ```text
//! +---------------------+------------------+----------+-----------+
//! | Length (2 bytes BE) | Header (fixed)   | Cmd (2)  | Payload   |
//! +---------------------+------------------+----------+-----------+
//! ```
//!
//! The length counts header plus body and excludes itself, so frames are
//! capped at [`MAX_FRAME_LEN`] bytes on the wire. The header is an
//! optional per-deployment ASCII string that must match byte for byte;
//! deployments without one configure it empty.
//!
//! Responses use the same shape with `[resp code][error code][fields...]`
//! as the body; [`build`] only deals in opaque bodies; the response
//! layout lives with the handlers.

use thiserror::Error;

/// Upper bound on a whole frame: 16-bit length field plus the field itself.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize + 2;

/// Errors from frame parsing and building.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The declared length does not equal the received header+body length.
    #[error("declared length {declared} does not match received length {actual}")]
    MalformedFrame {
        /// Length from the wire prefix.
        declared: usize,
        /// Bytes actually received after the prefix.
        actual: usize,
    },

    /// The fixed header bytes did not match the configured header.
    #[error("message header mismatch")]
    BadHeader,

    /// Not enough bytes for the length prefix, header, or command code.
    #[error("frame truncated before {missing}")]
    ShortFrame {
        /// Which part of the frame was cut off.
        missing: &'static str,
    },

    /// A response body too large for the 16-bit length field.
    #[error("frame body of {size} bytes exceeds the 16-bit length field")]
    FrameTooLarge {
        /// Combined header+body size.
        size: usize,
    },
}

/// Parses one request frame.
///
/// Returns the 2-byte command code and the payload tail. A zero-length
/// payload is legal; payload bytes beyond what a command's grammar reads
/// are the grammar's concern.
///
/// # Errors
///
/// [`FrameError::ShortFrame`] when the prefix, header, or command code is
/// cut off; [`FrameError::MalformedFrame`] when the declared length is
/// wrong; [`FrameError::BadHeader`] when the header does not byte-compare
/// equal.
pub fn parse<'a>(
    bytes: &'a [u8],
    expected_header: &[u8],
) -> Result<([u8; 2], &'a [u8]), FrameError> {
    let Some((prefix, rest)) = bytes.split_first_chunk::<2>() else {
        return Err(FrameError::ShortFrame {
            missing: "length prefix",
        });
    };

    let declared = u16::from_be_bytes(*prefix) as usize;
    if declared != rest.len() {
        return Err(FrameError::MalformedFrame {
            declared,
            actual: rest.len(),
        });
    }

    if rest.len() < expected_header.len() {
        return Err(FrameError::ShortFrame { missing: "header" });
    }
    let (header, rest) = rest.split_at(expected_header.len());
    if header != expected_header {
        return Err(FrameError::BadHeader);
    }

    let Some((cmd, payload)) = rest.split_first_chunk::<2>() else {
        return Err(FrameError::ShortFrame {
            missing: "command code",
        });
    };

    Ok((*cmd, payload))
}

/// Builds one frame around `body`, prepending `header` and the big-endian
/// length of `header+body`.
///
/// # Errors
///
/// [`FrameError::FrameTooLarge`] when header+body exceeds the 16-bit
/// length field.
pub fn build(header: &[u8], body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let size = header.len() + body.len();
    let Ok(declared) = u16::try_from(size) else {
        return Err(FrameError::FrameTooLarge { size });
    };

    let mut frame = Vec::with_capacity(2 + size);
    frame.extend_from_slice(&declared.to_be_bytes());
    frame.extend_from_slice(header);
    frame.extend_from_slice(body);
    Ok(frame)
}
