//! NC: diagnostics.

use crate::command::FieldMap;
use crate::context::HsmContext;
use crate::crypto::key_check_value;

use super::{Outcome, ERR_VERIFY_FAILURE, FIRMWARE_VERSION};

/// Reports the LMK check value and the firmware identity.
pub(super) fn diagnostics(ctx: &HsmContext) -> Outcome {
    let kcv = key_check_value(ctx.lmk(), 16)
        .map_err(|_| ctx.policy().apply_key_path(ERR_VERIFY_FAILURE))?;

    let mut fields = FieldMap::new();
    fields.insert("LMK Check Value", kcv);
    fields.insert("Firmware Version", FIRMWARE_VERSION);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use crate::command::parse_request;
    use crate::context::{HsmContext, Policy, DEFAULT_LMK_HEX};
    use crate::handler::dispatch;

    #[test]
    fn test_diagnostics_fields() {
        let ctx = HsmContext::new(DEFAULT_LMK_HEX, Policy::default()).unwrap();
        let req = parse_request(*b"NC", b"").unwrap();
        let resp = dispatch(&ctx, &req);

        assert_eq!(resp.code, *b"ND");
        assert_eq!(resp.error, *b"00");
        assert_eq!(resp.fields.get("LMK Check Value").map(<[u8]>::len), Some(16));
        assert_eq!(resp.fields.get("Firmware Version"), Some(&b"0007-E000"[..]));
    }

    #[test]
    fn test_lmk_check_value_vector() {
        // E(LMK, 0^16) for the default key, computed independently.
        let ctx = HsmContext::new(DEFAULT_LMK_HEX, Policy::default()).unwrap();
        let req = parse_request(*b"NC", b"").unwrap();
        let resp = dispatch(&ctx, &req);
        let kcv = resp.fields.get("LMK Check Value").unwrap();
        assert_eq!(
            hex::encode_upper(kcv),
            "F4EDC8DEB67F6E28F4EDC8DEB67F6E28"
        );
    }
}
