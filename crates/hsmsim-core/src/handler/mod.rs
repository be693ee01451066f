//! Per-command handlers.
//!
//! Each handler is a small validate → transform → respond machine. The
//! response code is fixed by the command table before any error branch
//! runs, so a failed validation still answers with the right response
//! code and a non-zero error code. Semantic failures never close the
//! connection; that is reserved for frame and grammar violations.
//!
//! The universal validation order, each step with its own error code:
//!
//! 1. terminal-side key parity (TPK/ZPK/CVK): `10`
//! 2. PVK pair parity: `11`
//! 3. PVK pair double-length: `27`
//! 4. PVV/CVV comparison: `01`
//! 5. any cryptographic failure inside the handler: `01`
//!
//! The approve-all policy relaxes a path-dependent subset of these; see
//! [`crate::context::Policy`].

mod card;
mod common;
mod diag;
mod keys;
mod pin;

use tracing::{debug, warn};

use crate::command::{FieldMap, Request};
use crate::context::HsmContext;

/// Firmware identity reported by the diagnostics command.
pub const FIRMWARE_VERSION: &[u8] = b"0007-E000";

/// Response code for commands the simulator does not implement.
pub const RESPONSE_UNSUPPORTED: [u8; 2] = *b"ZZ";

/// No error.
pub const ERR_NO_ERROR: [u8; 2] = *b"00";
/// Verification mismatch or a cryptographic failure inside a handler.
pub const ERR_VERIFY_FAILURE: [u8; 2] = *b"01";
/// Odd-parity failure on a recovered terminal-side key (TPK/ZPK/CVK).
pub const ERR_TERMINAL_KEY_PARITY: [u8; 2] = *b"10";
/// Odd-parity failure on a recovered PVK pair.
pub const ERR_PVK_PARITY: [u8; 2] = *b"11";
/// The PVK pair was not double length.
pub const ERR_PVK_NOT_DOUBLE_LENGTH: [u8; 2] = *b"27";

/// A wire response: response code, error code, result fields.
///
/// The body serialises as response code, error code, then each field's
/// bytes in insertion order; fields are self-delimiting by construction
/// of the per-command grammar, so there are no separators.
#[derive(Debug)]
pub struct Response {
    /// Two-letter response code from the command table.
    pub code: [u8; 2],
    /// Two-digit ASCII error code, `00` on success.
    pub error: [u8; 2],
    /// Result fields in emission order.
    pub fields: FieldMap,
}

impl Response {
    /// Serialises the response body (everything after the frame header).
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(4 + self.fields.iter().map(|(_, v)| v.len()).sum::<usize>());
        body.extend_from_slice(&self.code);
        body.extend_from_slice(&self.error);
        for (_, value) in self.fields.iter() {
            body.extend_from_slice(value);
        }
        body
    }
}

/// Outcome of a handler body: result fields, or the error code to report.
type Outcome = Result<FieldMap, [u8; 2]>;

fn respond(code: [u8; 2], outcome: Outcome) -> Response {
    match outcome {
        Ok(fields) => Response {
            code,
            error: ERR_NO_ERROR,
            fields,
        },
        Err(error) => Response {
            code,
            error,
            fields: FieldMap::new(),
        },
    }
}

/// Dispatches a parsed request to its handler.
///
/// Unknown commands answer with response code `ZZ` and error `00`: a
/// well-formed frame, not a connection error.
#[must_use]
pub fn dispatch(ctx: &HsmContext, req: &Request) -> Response {
    debug!(
        command = %String::from_utf8_lossy(&req.code),
        description = req.description,
        "dispatching"
    );
    match &req.code {
        b"NC" => respond(*b"ND", diag::diagnostics(ctx)),
        b"A0" => respond(*b"A1", keys::generate_key(ctx, req)),
        b"BU" => respond(*b"BV", keys::generate_check_value(ctx, req)),
        b"CA" => respond(*b"CB", pin::translate_pin_block(ctx, req)),
        b"CW" => respond(*b"CX", card::generate_cvv(ctx, req)),
        b"CY" => respond(*b"CZ", card::verify_cvv(ctx, req)),
        b"DC" => respond(*b"DD", pin::verify_pin(ctx, req, "TPK")),
        b"EC" => respond(*b"ED", pin::verify_pin(ctx, req, "ZPK")),
        b"FA" => respond(*b"FB", keys::translate_zpk(ctx, req)),
        b"HC" => respond(*b"HD", keys::replace_terminal_key(ctx, req)),
        _ => {
            warn!(
                command = %String::from_utf8_lossy(&req.code),
                "unsupported command"
            );
            Response {
                code: RESPONSE_UNSUPPORTED,
                error: ERR_NO_ERROR,
                fields: FieldMap::new(),
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_request;
    use crate::context::Policy;

    fn ctx() -> HsmContext {
        HsmContext::new(crate::context::DEFAULT_LMK_HEX, Policy::default()).unwrap()
    }

    #[test]
    fn test_unknown_command_answers_zz() {
        let req = parse_request(*b"ZX", b"").unwrap();
        let resp = dispatch(&ctx(), &req);
        assert_eq!(resp.code, *b"ZZ");
        assert_eq!(resp.error, *b"00");
        assert!(resp.fields.is_empty());
        assert_eq!(resp.body_bytes(), b"ZZ00");
    }

    #[test]
    fn test_body_layout_is_code_error_fields() {
        let mut fields = FieldMap::new();
        fields.insert("first", b"AAAA".to_vec());
        fields.insert("second", b"BB".to_vec());
        let resp = Response {
            code: *b"ND",
            error: *b"00",
            fields,
        };
        assert_eq!(resp.body_bytes(), b"ND00AAAABB");
    }

    #[test]
    fn test_response_code_fixed_on_error() {
        // A parity failure still answers with the command's response code.
        let mut payload = b"U".to_vec();
        payload.extend_from_slice(&[b'0'; 32]);
        payload.extend_from_slice(b"4321432143214321;2609101");
        let req = parse_request(*b"CW", &payload).unwrap();
        let resp = dispatch(&ctx(), &req);
        assert_eq!(resp.code, *b"CX");
        assert_ne!(resp.error, *b"00");
    }
}
