//! PIN commands: DC, EC, CA.

use subtle::ConstantTimeEq;

use crate::command::{FieldMap, Request};
use crate::context::HsmContext;
use crate::derive::{derive_pvv, encode_pin_block, extract_pin};

use super::common::{des3_key, ensure_parity, recover_key_under_lmk, require, require_str};
use super::{
    Outcome, ERR_PVK_NOT_DOUBLE_LENGTH, ERR_PVK_PARITY, ERR_TERMINAL_KEY_PARITY,
    ERR_VERIFY_FAILURE,
};

/// DC / EC: verify a PIN against its PVV.
///
/// The two commands share this machine; `key_name` selects which field
/// (TPK for DC, ZPK for EC) supplies the PIN-block decryption key. EC
/// format 04 carries a token in place of the account number, which then
/// feeds the PVV string.
pub(super) fn verify_pin(ctx: &HsmContext, req: &Request, key_name: &'static str) -> Outcome {
    let relax = |e| ctx.policy().apply_pin_path(e);

    let clear_terminal = recover_key_under_lmk(ctx, require(req, key_name)?).map_err(relax)?;
    ensure_parity(ctx, &clear_terminal, relax(ERR_TERMINAL_KEY_PARITY))?;
    let terminal_key = des3_key(&clear_terminal).map_err(relax)?;

    let clear_pvk = recover_key_under_lmk(ctx, require(req, "PVK Pair")?).map_err(relax)?;
    ensure_parity(ctx, &clear_pvk, relax(ERR_PVK_PARITY))?;
    if clear_pvk.len() != 16 {
        // Never relaxed, even under approve-all.
        return Err(ERR_PVK_NOT_DOUBLE_LENGTH);
    }
    let pvk = des3_key(&clear_pvk).map_err(relax)?;

    let block_cipher =
        hex::decode(require(req, "PIN Block")?).map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let clear_block = terminal_key
        .decrypt(&block_cipher)
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let pin = extract_pin(&clear_block).map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let account = require_str(req, "Account Number")
        .or_else(|_| require_str(req, "Token"))
        .map_err(relax)?;
    let pvki = require_str(req, "PVKI").map_err(relax)?;
    let expected =
        derive_pvv(&pvk, account, pvki, &pin).map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let supplied = require(req, "PVV").map_err(relax)?;
    if !bool::from(expected.as_bytes().ct_eq(supplied)) {
        return Err(relax(ERR_VERIFY_FAILURE));
    }

    Ok(FieldMap::new())
}

/// CA: translate a PIN block from TPK to destination-key encryption.
///
/// Only ISO format 0 is carried on this simulator, so the source and
/// destination format fields are parsed but not branched on.
pub(super) fn translate_pin_block(ctx: &HsmContext, req: &Request) -> Outcome {
    let relax = |e| ctx.policy().apply_pin_path(e);

    let clear_tpk = recover_key_under_lmk(ctx, require(req, "TPK")?).map_err(relax)?;
    ensure_parity(ctx, &clear_tpk, relax(ERR_TERMINAL_KEY_PARITY))?;
    let tpk = des3_key(&clear_tpk).map_err(relax)?;

    let clear_dest =
        recover_key_under_lmk(ctx, require(req, "Destination Key")?).map_err(relax)?;
    ensure_parity(ctx, &clear_dest, relax(ERR_TERMINAL_KEY_PARITY))?;
    let dest = des3_key(&clear_dest).map_err(relax)?;

    let block_cipher =
        hex::decode(require(req, "Source PIN Block")?).map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let clear_block = tpk
        .decrypt(&block_cipher)
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let pin = extract_pin(&clear_block).map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let max_len: usize = require_str(req, "Maximum PIN Length")
        .map_err(relax)?
        .parse()
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    if pin.len() > max_len {
        return Err(relax(ERR_VERIFY_FAILURE));
    }

    let out_block = encode_pin_block(&pin).map_err(|_| relax(ERR_VERIFY_FAILURE))?;
    let out_cipher = dest
        .encrypt(&out_block)
        .map_err(|_| relax(ERR_VERIFY_FAILURE))?;

    let mut fields = FieldMap::new();
    fields.insert("PIN Length", format!("{:02}", pin.len()).into_bytes());
    fields.insert(
        "Destination PIN Block",
        hex::encode_upper(out_cipher).into_bytes(),
    );
    Ok(fields)
}
