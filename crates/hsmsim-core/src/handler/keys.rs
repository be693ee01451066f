//! Key-management commands: A0, BU, FA, HC.

use crate::command::{FieldMap, Request};
use crate::context::HsmContext;
use crate::crypto::{self, key_check_value};

use super::common::{
    decode_key_field, des3_key, ensure_parity, enveloped, recover_key_under_lmk, require,
};
use super::{Outcome, ERR_TERMINAL_KEY_PARITY, ERR_VERIFY_FAILURE};

/// A0: generate a working key.
///
/// Always returns the new key encrypted under the LMK. When the request
/// carries a ZMK/TMK envelope, the key is additionally exported under that
/// ZMK together with a 6-byte check value of the clear key.
pub(super) fn generate_key(ctx: &HsmContext, req: &Request) -> Outcome {
    let relax = |e| ctx.policy().apply_key_path(e);

    let fresh = crypto::generate_key().map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let under_lmk = ctx
        .lmk()
        .encrypt(fresh.as_bytes())
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let mut fields = FieldMap::new();
    fields.insert("Key under LMK", enveloped(&under_lmk));

    if let Some(zmk_field) = req.fields.get("ZMK/TMK") {
        let clear_zmk = recover_key_under_lmk(ctx, zmk_field).map_err(relax)?;
        let zmk = des3_key(&clear_zmk).map_err(relax)?;
        let under_zmk = zmk
            .encrypt(fresh.as_bytes())
            .map_err(|_| relax(ERR_VERIFY_FAILURE))?;
        let kcv = key_check_value(&fresh, 6).map_err(|_| relax(ERR_VERIFY_FAILURE))?;

        fields.insert("Key under ZMK", enveloped(&under_zmk));
        fields.insert("Key Check Value", kcv);
    }

    Ok(fields)
}

/// BU: key check value.
///
/// The enveloped hex is the key itself here: the tag is stripped when it
/// is `U` and the 32 hex characters become the 16 key bytes directly, with
/// no LMK decryption. The emitted check value is the full 16 bytes; the
/// real device documents 6, but the behaviour being mirrored emits 16.
pub(super) fn generate_check_value(ctx: &HsmContext, req: &Request) -> Outcome {
    let relax = |e| ctx.policy().apply_key_path(e);

    let field = require(req, "Key").map_err(relax)?;
    let material = decode_key_field(field).map_err(relax)?;
    let key = des3_key(&material).map_err(relax)?;
    let kcv = key_check_value(&key, 16).map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let mut fields = FieldMap::new();
    fields.insert("Key Check Value", kcv);
    Ok(fields)
}

/// FA: translate a ZPK from ZMK to LMK encryption.
pub(super) fn translate_zpk(ctx: &HsmContext, req: &Request) -> Outcome {
    let relax = |e| ctx.policy().apply_key_path(e);

    let clear_zmk = recover_key_under_lmk(ctx, require(req, "ZMK")?).map_err(relax)?;
    let zmk = des3_key(&clear_zmk).map_err(relax)?;

    let zpk_cipher = decode_key_field(require(req, "ZPK")?).map_err(relax)?;
    let clear_zpk = zmk
        .decrypt(&zpk_cipher)
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    ensure_parity(ctx, &clear_zpk, relax(ERR_TERMINAL_KEY_PARITY))?;

    let zpk = des3_key(&clear_zpk).map_err(relax)?;
    let under_lmk = ctx
        .lmk()
        .encrypt(&clear_zpk)
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let kcv = key_check_value(&zpk, 6).map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let mut fields = FieldMap::new();
    fields.insert("ZPK under LMK", enveloped(&under_lmk));
    fields.insert("Key Check Value", kcv);
    Ok(fields)
}

/// HC: generate a replacement terminal key.
///
/// The current key arrives either as a `U` envelope or as 16 bare hex
/// characters (a single-length key whose 8 clear bytes double up for the
/// cipher). The fresh key goes back under both the current key and the
/// LMK.
pub(super) fn replace_terminal_key(ctx: &HsmContext, req: &Request) -> Outcome {
    let relax = |e| ctx.policy().apply_key_path(e);

    let clear_current =
        recover_key_under_lmk(ctx, require(req, "Current Key")?).map_err(relax)?;
    let current = des3_key(&clear_current).map_err(relax)?;

    let fresh = crypto::generate_key().map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let under_current = current
        .encrypt(fresh.as_bytes())
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let under_lmk = ctx
        .lmk()
        .encrypt(fresh.as_bytes())
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let mut fields = FieldMap::new();
    fields.insert("Key under current key", enveloped(&under_current));
    fields.insert("Key under LMK", enveloped(&under_lmk));
    Ok(fields)
}
