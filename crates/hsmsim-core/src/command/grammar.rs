//! The per-command field grammar.
//!
//! One parse function per supported command, each a flat sequence of
//! cursor takes mirroring the device's message layouts. Key fields widen
//! to their 33-byte envelope form when the look-ahead byte is one of the
//! command's accepted scheme sentinels; the sentinel sets differ between
//! commands and between fields, and are reproduced here exactly.

use super::{CommandError, Cursor, FieldMap};

/// Key-scheme sentinels accepted for fully enveloped key fields.
const SCHEME_TAGS: &[u8] = b"UTSX";

/// A parsed request: command code, human description, named fields.
///
/// Field order matters only for trace output; handlers look fields up by
/// name.
#[derive(Debug)]
pub struct Request {
    /// Two-letter command code as received.
    pub code: [u8; 2],
    /// Human description of the operation, for trace output.
    pub description: &'static str,
    /// Parsed fields in wire order.
    pub fields: FieldMap,
}

impl Request {
    fn new(code: [u8; 2], description: &'static str) -> Self {
        Self {
            code,
            description,
            fields: FieldMap::new(),
        }
    }
}

/// Parses a command payload into its named fields.
///
/// Unknown command codes parse successfully to an empty field map; they
/// are answerable (with the `ZZ` response), not malformed. Trailing bytes
/// beyond a command's grammar are ignored.
///
/// # Errors
///
/// Returns [`CommandError`] when a known command's payload violates its
/// grammar; the session layer treats that as fatal to the connection.
pub fn parse_request(code: [u8; 2], payload: &[u8]) -> Result<Request, CommandError> {
    let mut cur = Cursor::new(payload);
    match &code {
        b"NC" => Ok(Request::new(code, "Perform diagnostics")),
        b"A0" => parse_a0(code, &mut cur),
        b"BU" => parse_bu(code, &mut cur),
        b"CA" => parse_ca(code, &mut cur),
        b"CW" => parse_cw(code, &mut cur),
        b"CY" => parse_cy(code, &mut cur),
        b"DC" => parse_dc(code, &mut cur),
        b"EC" => parse_ec(code, &mut cur),
        b"FA" => parse_fa(code, &mut cur),
        b"HC" => parse_hc(code, &mut cur),
        _ => Ok(Request::new(code, "Unsupported command")),
    }
}

/// Takes a key field: the 33-byte envelope when the look-ahead byte is in
/// `sentinels`, otherwise `bare_len` bytes without consuming the test
/// byte.
fn key_field<'a>(
    cur: &mut Cursor<'a>,
    sentinels: &[u8],
    bare_len: usize,
    field: &'static str,
) -> Result<&'a [u8], CommandError> {
    match cur.peek() {
        Some(tag) if sentinels.contains(&tag) => cur.take(33, field),
        _ => cur.take(bare_len, field),
    }
}

fn parse_a0(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Generate a key");
    let mode = cur.take(1, "Mode")?;
    req.fields.insert("Mode", mode);
    req.fields.insert("Key Type", cur.take(3, "Key Type")?);
    req.fields.insert("Key Scheme", cur.take(1, "Key Scheme")?);

    if mode == b"1" && cur.peek() == Some(b';') {
        cur.expect(b';', "A0")?;
        req.fields
            .insert("ZMK/TMK Flag", cur.take(1, "ZMK/TMK Flag")?);
        if cur.peek() == Some(b'U') {
            req.fields.insert("ZMK/TMK", cur.take(33, "ZMK/TMK")?);
        }
    }
    Ok(req)
}

fn parse_bu(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Generate a key check value");
    req.fields
        .insert("Key Type Code", cur.take(2, "Key Type Code")?);
    req.fields
        .insert("Key Length Flag", cur.take(1, "Key Length Flag")?);
    if cur.peek() == Some(b'U') {
        req.fields.insert("Key", cur.take(33, "Key")?);
    }
    Ok(req)
}

fn parse_ca(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Translate a PIN block from TPK to ZPK encryption");
    req.fields
        .insert("TPK", key_field(cur, SCHEME_TAGS, 32, "TPK")?);
    req.fields.insert(
        "Destination Key",
        key_field(cur, SCHEME_TAGS, 32, "Destination Key")?,
    );
    req.fields
        .insert("Maximum PIN Length", cur.take(2, "Maximum PIN Length")?);
    req.fields
        .insert("Source PIN Block", cur.take(16, "Source PIN Block")?);
    req.fields
        .insert("Source Format", cur.take(2, "Source Format")?);
    req.fields
        .insert("Destination Format", cur.take(2, "Destination Format")?);
    req.fields
        .insert("Account Number", cur.take(12, "Account Number")?);
    Ok(req)
}

fn parse_cw(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Generate a card verification value");
    req.fields
        .insert("CVK", key_field(cur, SCHEME_TAGS, 32, "CVK")?);
    req.fields.insert("PAN", cur.take_until(b';', "CW")?);
    req.fields.insert("Expiry Date", cur.take(4, "Expiry Date")?);
    req.fields.insert("Service Code", cur.take(3, "Service Code")?);
    Ok(req)
}

fn parse_cy(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Verify a card verification value");
    req.fields
        .insert("CVK", key_field(cur, SCHEME_TAGS, 32, "CVK")?);
    req.fields.insert("CVV", cur.take(3, "CVV")?);
    req.fields.insert("PAN", cur.take_until(b';', "CY")?);
    req.fields.insert("Expiry Date", cur.take(4, "Expiry Date")?);
    req.fields.insert("Service Code", cur.take(3, "Service Code")?);
    Ok(req)
}

fn parse_dc(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Verify a PIN encrypted under a TPK");
    req.fields
        .insert("TPK", key_field(cur, SCHEME_TAGS, 32, "TPK")?);
    req.fields
        .insert("PVK Pair", key_field(cur, b"U", 32, "PVK Pair")?);
    req.fields.insert("PIN Block", cur.take(16, "PIN Block")?);
    req.fields.insert("Format", cur.take(2, "Format")?);
    req.fields
        .insert("Account Number", cur.take(12, "Account Number")?);
    req.fields.insert("PVKI", cur.take(1, "PVKI")?);
    req.fields.insert("PVV", cur.take(4, "PVV")?);
    Ok(req)
}

fn parse_ec(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Verify a PIN encrypted under a ZPK");
    req.fields.insert("ZPK", key_field(cur, b"U", 32, "ZPK")?);
    req.fields
        .insert("PVK Pair", key_field(cur, b"U", 32, "PVK Pair")?);
    req.fields.insert("PIN Block", cur.take(16, "PIN Block")?);
    let format = cur.take(2, "Format")?;
    req.fields.insert("Format", format);
    if format == b"04" {
        req.fields.insert("Token", cur.take(18, "Token")?);
    } else {
        req.fields
            .insert("Account Number", cur.take(12, "Account Number")?);
    }
    req.fields.insert("PVKI", cur.take(1, "PVKI")?);
    req.fields.insert("PVV", cur.take(4, "PVV")?);
    Ok(req)
}

fn parse_fa(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Translate a ZPK from ZMK to LMK encryption");
    req.fields.insert("ZMK", key_field(cur, b"UT", 32, "ZMK")?);
    req.fields.insert("ZPK", key_field(cur, b"UTX", 32, "ZPK")?);
    Ok(req)
}

fn parse_hc(code: [u8; 2], cur: &mut Cursor<'_>) -> Result<Request, CommandError> {
    let mut req = Request::new(code, "Generate a replacement terminal key");
    req.fields
        .insert("Current Key", key_field(cur, b"U", 16, "Current Key")?);
    cur.expect(b';', "HC")?;
    req.fields
        .insert("Key Scheme (TMK)", cur.take(1, "Key Scheme (TMK)")?);
    req.fields
        .insert("Key Scheme (LMK)", cur.take(1, "Key Scheme (LMK)")?);
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(tag: u8) -> Vec<u8> {
        let mut field = vec![tag];
        field.extend_from_slice(&[b'A'; 32]);
        field
    }

    #[test]
    fn test_nc_ignores_payload() {
        let req = parse_request(*b"NC", b"0000").unwrap();
        assert!(req.fields.is_empty());
    }

    #[test]
    fn test_a0_without_zmk() {
        let req = parse_request(*b"A0", b"0002U").unwrap();
        assert_eq!(req.fields.get("Mode"), Some(&b"0"[..]));
        assert_eq!(req.fields.get("Key Type"), Some(&b"002"[..]));
        assert_eq!(req.fields.get("Key Scheme"), Some(&b"U"[..]));
        assert!(!req.fields.contains("ZMK/TMK"));
    }

    #[test]
    fn test_a0_with_zmk_export() {
        let mut payload = b"1002U;0".to_vec();
        payload.extend_from_slice(&envelope(b'U'));
        let req = parse_request(*b"A0", &payload).unwrap();
        assert_eq!(req.fields.get("ZMK/TMK Flag"), Some(&b"0"[..]));
        assert_eq!(req.fields.get("ZMK/TMK").map(<[u8]>::len), Some(33));
    }

    #[test]
    fn test_a0_mode_zero_does_not_consume_delimiter() {
        // Mode '0' leaves a stray ';' unread; the grammar ignores the tail.
        let req = parse_request(*b"A0", b"0002U;rest").unwrap();
        assert!(!req.fields.contains("ZMK/TMK Flag"));
    }

    #[test]
    fn test_bu_with_envelope() {
        let mut payload = b"021".to_vec();
        payload.extend_from_slice(&envelope(b'U'));
        let req = parse_request(*b"BU", &payload).unwrap();
        assert_eq!(req.fields.get("Key Type Code"), Some(&b"02"[..]));
        assert_eq!(req.fields.get("Key Length Flag"), Some(&b"1"[..]));
        assert_eq!(req.fields.get("Key").map(<[u8]>::len), Some(33));
    }

    #[test]
    fn test_bu_without_key_field() {
        let req = parse_request(*b"BU", b"021").unwrap();
        assert!(!req.fields.contains("Key"));
    }

    #[test]
    fn test_ca_full_layout() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(&envelope(b'X'));
        payload.extend_from_slice(b"12");
        payload.extend_from_slice(&[b'F'; 16]);
        payload.extend_from_slice(b"0101");
        payload.extend_from_slice(b"123456789012");
        let req = parse_request(*b"CA", &payload).unwrap();
        assert_eq!(req.fields.get("TPK").map(<[u8]>::len), Some(33));
        assert_eq!(req.fields.get("Destination Key").map(<[u8]>::len), Some(33));
        assert_eq!(req.fields.get("Maximum PIN Length"), Some(&b"12"[..]));
        assert_eq!(req.fields.get("Source Format"), Some(&b"01"[..]));
        assert_eq!(req.fields.get("Destination Format"), Some(&b"01"[..]));
        assert_eq!(req.fields.get("Account Number"), Some(&b"123456789012"[..]));
    }

    #[test]
    fn test_cw_pan_delimited() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(b"4321432143214321;2609101");
        let req = parse_request(*b"CW", &payload).unwrap();
        assert_eq!(req.fields.get("PAN"), Some(&b"4321432143214321"[..]));
        assert_eq!(req.fields.get("Expiry Date"), Some(&b"2609"[..]));
        assert_eq!(req.fields.get("Service Code"), Some(&b"101"[..]));
    }

    #[test]
    fn test_cw_missing_delimiter_is_malformed() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(b"43214321432143212609101");
        assert_eq!(
            parse_request(*b"CW", &payload).unwrap_err(),
            CommandError::MalformedCommand {
                command: "CW",
                delimiter: ';'
            }
        );
    }

    #[test]
    fn test_cy_carries_cvv_before_pan() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(b"2814321432143214321;2609101");
        let req = parse_request(*b"CY", &payload).unwrap();
        assert_eq!(req.fields.get("CVV"), Some(&b"281"[..]));
        assert_eq!(req.fields.get("PAN"), Some(&b"4321432143214321"[..]));
    }

    #[test]
    fn test_dc_bare_pvk_pair() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(&[b'B'; 32]); // bare PVK pair
        payload.extend_from_slice(&[b'F'; 16]);
        payload.extend_from_slice(b"01");
        payload.extend_from_slice(b"123456789012");
        payload.extend_from_slice(b"1");
        payload.extend_from_slice(b"4186");
        let req = parse_request(*b"DC", &payload).unwrap();
        assert_eq!(req.fields.get("PVK Pair").map(<[u8]>::len), Some(32));
        assert_eq!(req.fields.get("PVV"), Some(&b"4186"[..]));
    }

    #[test]
    fn test_dc_enveloped_pvk_pair() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(&envelope(b'U'));
        payload.extend_from_slice(&[b'F'; 16]);
        payload.extend_from_slice(b"01");
        payload.extend_from_slice(b"123456789012");
        payload.extend_from_slice(b"14186");
        let req = parse_request(*b"DC", &payload).unwrap();
        assert_eq!(req.fields.get("PVK Pair").map(<[u8]>::len), Some(33));
    }

    #[test]
    fn test_dc_pvk_pair_ignores_other_scheme_tags() {
        // 'T' is not a PVK sentinel: the field stays 32 bytes wide.
        let mut payload = envelope(b'U');
        payload.extend_from_slice(&[b'T'; 32]);
        payload.extend_from_slice(&[b'F'; 16]);
        payload.extend_from_slice(b"01");
        payload.extend_from_slice(b"123456789012");
        payload.extend_from_slice(b"14186");
        let req = parse_request(*b"DC", &payload).unwrap();
        assert_eq!(req.fields.get("PVK Pair").map(<[u8]>::len), Some(32));
    }

    #[test]
    fn test_ec_format_04_takes_token() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(&[b'B'; 32]);
        payload.extend_from_slice(&[b'F'; 16]);
        payload.extend_from_slice(b"04");
        payload.extend_from_slice(b"123456789012345678"); // 18-byte token
        payload.extend_from_slice(b"14186");
        let req = parse_request(*b"EC", &payload).unwrap();
        assert_eq!(req.fields.get("Token").map(<[u8]>::len), Some(18));
        assert!(!req.fields.contains("Account Number"));
    }

    #[test]
    fn test_ec_other_formats_take_account() {
        let mut payload = envelope(b'U');
        payload.extend_from_slice(&[b'B'; 32]);
        payload.extend_from_slice(&[b'F'; 16]);
        payload.extend_from_slice(b"01");
        payload.extend_from_slice(b"123456789012");
        payload.extend_from_slice(b"14186");
        let req = parse_request(*b"EC", &payload).unwrap();
        assert_eq!(req.fields.get("Account Number"), Some(&b"123456789012"[..]));
        assert!(!req.fields.contains("Token"));
    }

    #[test]
    fn test_fa_sentinel_sets() {
        // ZMK accepts U/T, ZPK accepts U/T/X.
        let mut payload = envelope(b'T');
        payload.extend_from_slice(&envelope(b'X'));
        let req = parse_request(*b"FA", &payload).unwrap();
        assert_eq!(req.fields.get("ZMK").map(<[u8]>::len), Some(33));
        assert_eq!(req.fields.get("ZPK").map(<[u8]>::len), Some(33));

        // 'X' is not a ZMK sentinel, so the field is its bare 32-byte form.
        let mut payload = vec![b'X'];
        payload.extend_from_slice(&[b'A'; 31]);
        payload.extend_from_slice(&envelope(b'U'));
        let req = parse_request(*b"FA", &payload).unwrap();
        assert_eq!(req.fields.get("ZMK").map(<[u8]>::len), Some(32));
    }

    #[test]
    fn test_hc_bare_current_key_is_sixteen() {
        let req = parse_request(*b"HC", b"0123456789ABCDEF;UU").unwrap();
        assert_eq!(req.fields.get("Current Key").map(<[u8]>::len), Some(16));
        assert_eq!(req.fields.get("Key Scheme (TMK)"), Some(&b"U"[..]));
        assert_eq!(req.fields.get("Key Scheme (LMK)"), Some(&b"U"[..]));
    }

    #[test]
    fn test_hc_missing_delimiter_is_malformed() {
        assert!(matches!(
            parse_request(*b"HC", b"0123456789ABCDEFUU"),
            Err(CommandError::MalformedCommand { command: "HC", .. })
        ));
    }

    #[test]
    fn test_truncated_envelope_is_short_field() {
        // Sentinel present but fewer than 33 bytes remain.
        let mut payload = vec![b'U'];
        payload.extend_from_slice(&[b'A'; 20]);
        assert!(matches!(
            parse_request(*b"CW", &payload),
            Err(CommandError::ShortField { field: "CVK", .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut payload = b"021".to_vec();
        payload.extend_from_slice(&envelope(b'U'));
        payload.extend_from_slice(b"garbage-tail");
        assert!(parse_request(*b"BU", &payload).is_ok());
    }

    #[test]
    fn test_unknown_command_parses_empty() {
        let req = parse_request(*b"ZX", b"anything at all").unwrap();
        assert!(req.fields.is_empty());
        assert_eq!(req.description, "Unsupported command");
    }
}
