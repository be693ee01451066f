//! Shared helpers for the command handlers.

use crate::command::Request;
use crate::context::HsmContext;
use crate::crypto::{check_odd_parity, Des3Key};

use super::ERR_VERIFY_FAILURE;

/// Strips the scheme tag iff it is `U` and hex-decodes the rest.
///
/// Other scheme tags (`T`/`S`/`X`) are deliberately left in place: the
/// device this simulator mirrors only special-cases `U`, so a `T`-tagged
/// envelope reaches the hex decoder tag and all, fails there, and surfaces
/// as error `01`. That tolerance is part of the observed wire behaviour.
pub(super) fn decode_key_field(field: &[u8]) -> Result<Vec<u8>, [u8; 2]> {
    let hex_part = match field.first() {
        Some(&b'U') => &field[1..],
        _ => field,
    };
    hex::decode(hex_part).map_err(|_| ERR_VERIFY_FAILURE)
}

/// Recovers clear key material: decode the field, then decrypt under LMK.
pub(super) fn recover_key_under_lmk(
    ctx: &HsmContext,
    field: &[u8],
) -> Result<Vec<u8>, [u8; 2]> {
    let ciphertext = decode_key_field(field)?;
    ctx.lmk()
        .decrypt(&ciphertext)
        .map_err(|_| ERR_VERIFY_FAILURE)
}

/// Checks odd parity of recovered key material unless policy skips it.
pub(super) fn ensure_parity(
    ctx: &HsmContext,
    clear: &[u8],
    error: [u8; 2],
) -> Result<(), [u8; 2]> {
    if !ctx.policy().skip_parity && !check_odd_parity(clear) {
        return Err(error);
    }
    Ok(())
}

/// Builds a cipher key from recovered clear material.
pub(super) fn des3_key(clear: &[u8]) -> Result<Des3Key, [u8; 2]> {
    Des3Key::from_bytes(clear).map_err(|_| ERR_VERIFY_FAILURE)
}

/// Looks up a required request field, failing the handler when absent.
pub(super) fn require<'a>(req: &'a Request, name: &str) -> Result<&'a [u8], [u8; 2]> {
    req.fields.get(name).ok_or(ERR_VERIFY_FAILURE)
}

/// Request field as UTF-8 text.
pub(super) fn require_str<'a>(req: &'a Request, name: &str) -> Result<&'a str, [u8; 2]> {
    std::str::from_utf8(require(req, name)?).map_err(|_| ERR_VERIFY_FAILURE)
}

/// Wire form of a key ciphertext: `U` followed by 32 uppercase hex chars.
pub(super) fn enveloped(ciphertext: &[u8]) -> Vec<u8> {
    let mut field = Vec::with_capacity(1 + ciphertext.len() * 2);
    field.push(b'U');
    field.extend_from_slice(hex::encode_upper(ciphertext).as_bytes());
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HsmContext, Policy, DEFAULT_LMK_HEX};

    fn ctx() -> HsmContext {
        HsmContext::new(DEFAULT_LMK_HEX, Policy::default()).unwrap()
    }

    #[test]
    fn test_u_tag_is_stripped() {
        let field = b"U0123456789ABCDEF0123456789ABCDEF";
        assert_eq!(decode_key_field(field).unwrap().len(), 16);
    }

    #[test]
    fn test_bare_hex_decodes() {
        let field = b"0123456789ABCDEF0123456789ABCDEF";
        assert_eq!(decode_key_field(field).unwrap().len(), 16);
    }

    #[test]
    fn test_other_scheme_tags_fail_decode() {
        // 'T' is kept, making the field odd-length non-hex.
        let field = b"T0123456789ABCDEF0123456789ABCDEF";
        assert_eq!(decode_key_field(field), Err(ERR_VERIFY_FAILURE));
    }

    #[test]
    fn test_recover_roundtrip() {
        let ctx = ctx();
        let clear = [0x13u8; 16];
        let cipher = ctx.lmk().encrypt(&clear).unwrap();
        let field = enveloped(&cipher);
        assert_eq!(recover_key_under_lmk(&ctx, &field).unwrap(), clear);
    }

    #[test]
    fn test_enveloped_shape() {
        let field = enveloped(&[0xAB; 16]);
        assert_eq!(field.len(), 33);
        assert_eq!(field[0], b'U');
        assert!(field[1..].iter().all(u8::is_ascii_hexdigit));
    }
}
