//! Card verification commands: CW, CY.

use subtle::ConstantTimeEq;

use crate::command::{FieldMap, Request};
use crate::context::HsmContext;
use crate::derive::derive_cvv;

use super::common::{des3_key, ensure_parity, recover_key_under_lmk, require, require_str};
use super::{Outcome, ERR_TERMINAL_KEY_PARITY, ERR_VERIFY_FAILURE};

fn recover_cvk(ctx: &HsmContext, req: &Request) -> Result<crate::crypto::Des3Key, [u8; 2]> {
    let relax = |e| ctx.policy().apply_cvv_path(e);

    let clear = recover_key_under_lmk(ctx, require(req, "CVK")?).map_err(relax)?;
    // The CVK parity failure is never approved away; the device keeps the
    // `10` on this path even under approve-all.
    ensure_parity(ctx, &clear, ERR_TERMINAL_KEY_PARITY)?;
    des3_key(&clear).map_err(relax)
}

fn derive_for_request(
    ctx: &HsmContext,
    cvk: &crate::crypto::Des3Key,
    req: &Request,
) -> Result<String, [u8; 2]> {
    let relax = |e| ctx.policy().apply_cvv_path(e);
    let pan = require_str(req, "PAN").map_err(relax)?;
    let expiry = require_str(req, "Expiry Date").map_err(relax)?;
    let service = require_str(req, "Service Code").map_err(relax)?;
    derive_cvv(cvk, pan, expiry, service).map_err(|_| relax(ERR_VERIFY_FAILURE))
}

/// CW: generate a card verification value.
pub(super) fn generate_cvv(ctx: &HsmContext, req: &Request) -> Outcome {
    let cvk = recover_cvk(ctx, req)?;
    let cvv = derive_for_request(ctx, &cvk, req)?;

    let mut fields = FieldMap::new();
    fields.insert("CVV", cvv.into_bytes());
    Ok(fields)
}

/// CY: verify a card verification value.
pub(super) fn verify_cvv(ctx: &HsmContext, req: &Request) -> Outcome {
    let relax = |e| ctx.policy().apply_cvv_path(e);

    let cvk = recover_cvk(ctx, req)?;
    let expected = derive_for_request(ctx, &cvk, req)?;
    let supplied = require(req, "CVV").map_err(relax)?;

    if !bool::from(expected.as_bytes().ct_eq(supplied)) {
        return Err(relax(ERR_VERIFY_FAILURE));
    }
    Ok(FieldMap::new())
}
