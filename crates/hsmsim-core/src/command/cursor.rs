//! Byte cursor for sequential field parsing.

use super::CommandError;

/// A forward-only cursor over a command payload.
///
/// Every take is length-checked against the remaining bytes and reports
/// the field name on failure, so grammar code reads as a flat sequence of
/// `take` calls.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Wraps a payload.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Looks at the next byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Consumes exactly `n` bytes for the named field.
    ///
    /// # Errors
    ///
    /// [`CommandError::ShortField`] when fewer than `n` bytes remain.
    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CommandError> {
        if self.remaining() < n {
            return Err(CommandError::ShortField {
                field,
                wanted: n,
                available: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consumes bytes up to (not including) the next `delimiter`, then
    /// skips the delimiter itself.
    ///
    /// # Errors
    ///
    /// [`CommandError::MalformedCommand`] when the delimiter is absent
    /// from the remaining payload.
    pub fn take_until(
        &mut self,
        delimiter: u8,
        command: &'static str,
    ) -> Result<&'a [u8], CommandError> {
        let rest = &self.buf[self.pos..];
        let Some(at) = rest.iter().position(|&b| b == delimiter) else {
            return Err(CommandError::MalformedCommand {
                command,
                delimiter: delimiter as char,
            });
        };
        let out = &rest[..at];
        self.pos += at + 1;
        Ok(out)
    }

    /// Consumes a single expected delimiter byte.
    ///
    /// # Errors
    ///
    /// [`CommandError::MalformedCommand`] when the next byte is absent or
    /// different.
    pub fn expect(&mut self, delimiter: u8, command: &'static str) -> Result<(), CommandError> {
        if self.peek() == Some(delimiter) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CommandError::MalformedCommand {
                command,
                delimiter: delimiter as char,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_fixed_widths() {
        let mut cur = Cursor::new(b"0002U");
        assert_eq!(cur.take(1, "Mode").unwrap(), b"0");
        assert_eq!(cur.take(3, "Key Type").unwrap(), b"002");
        assert_eq!(cur.take(1, "Key Scheme").unwrap(), b"U");
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn test_take_past_end_reports_field() {
        let mut cur = Cursor::new(b"ab");
        let err = cur.take(5, "PIN Block").unwrap_err();
        assert_eq!(
            err,
            CommandError::ShortField {
                field: "PIN Block",
                wanted: 5,
                available: 2
            }
        );
    }

    #[test]
    fn test_take_until_splits_and_skips_delimiter() {
        let mut cur = Cursor::new(b"4321432143214321;2609101");
        assert_eq!(cur.take_until(b';', "CW").unwrap(), b"4321432143214321");
        assert_eq!(cur.take(4, "Expiry Date").unwrap(), b"2609");
    }

    #[test]
    fn test_take_until_missing_delimiter() {
        let mut cur = Cursor::new(b"4321432143214321");
        assert!(matches!(
            cur.take_until(b';', "CW"),
            Err(CommandError::MalformedCommand {
                command: "CW",
                delimiter: ';'
            })
        ));
    }

    #[test]
    fn test_expect_delimiter() {
        let mut cur = Cursor::new(b";1U");
        cur.expect(b';', "HC").unwrap();
        assert_eq!(cur.peek(), Some(b'1'));
        assert!(cur.expect(b';', "HC").is_err());
    }
}
