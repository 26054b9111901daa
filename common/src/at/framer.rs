use heapless::String;

/// Size of the receive buffer, one byte of it is reserved.
pub const AT_BUF_SIZE: usize = 128;

/// Maximum number of characters kept from a single modem line.
pub const LINE_CAPACITY: usize = AT_BUF_SIZE - 1;

/// A single line received from the modem, without its terminator.
pub type Line = String<LINE_CAPACITY>;

/// Splits the byte stream coming from the modem into lines.
///
/// Lines are terminated by CR, LF or both. Empty lines are never emitted, so a CRLF pair produces
/// a single line. Characters beyond `LINE_CAPACITY` are silently dropped until the next
/// terminator.
#[derive(Default)]
pub struct LineFramer {
    buf: Line,
}

impl LineFramer {
    pub const fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Feeds a single byte, returns a line if `byte` completed one.
    pub fn feed(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\r' | b'\n' => {
                if self.buf.is_empty() {
                    None
                } else {
                    Some(core::mem::take(&mut self.buf))
                }
            }
            byte => {
                // Non-ASCII bytes would take more than one byte in UTF-8
                let ch = if byte.is_ascii() { char::from(byte) } else { '?' };
                let _ = self.buf.push(ch);
                None
            }
        }
    }

    /// Feeds all currently available bytes, yielding every completed line.
    pub fn feed_all<'a>(&'a mut self, bytes: &'a [u8]) -> impl Iterator<Item = Line> + 'a {
        bytes.iter().filter_map(move |byte| self.feed(*byte))
    }

    /// Number of characters accumulated for the current line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod test_framer {
    use super::*;

    extern crate std;
    use std::vec::Vec;

    fn lines(framer: &mut LineFramer, bytes: &[u8]) -> Vec<Line> {
        framer.feed_all(bytes).collect()
    }

    #[test]
    fn test_crlf_collapses() {
        let mut framer = LineFramer::new();
        let lines = lines(&mut framer, b"\r\nOK\r\n\r\n+CEREG: 1\n\rAPP RDY\r");
        assert_eq!(lines.as_slice(), &["OK", "+CEREG: 1", "APP RDY"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_partial_line_is_kept() {
        let mut framer = LineFramer::new();
        assert!(lines(&mut framer, b"+QMTOP").is_empty());
        assert_eq!(framer.pending(), 6);
        assert_eq!(lines(&mut framer, b"EN: 0,0\r\n").as_slice(), &["+QMTOPEN: 0,0"]);
    }

    #[test]
    fn test_overflow_truncates() {
        let mut framer = LineFramer::new();
        let long = [b'x'; 130];
        assert!(lines(&mut framer, &long).is_empty());
        assert_eq!(framer.pending(), LINE_CAPACITY);

        let lines = lines(&mut framer, b"\r");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 127);
        assert!(lines[0].chars().all(|ch| ch == 'x'));
    }

    #[test]
    fn test_non_ascii_is_replaced() {
        let mut framer = LineFramer::new();
        assert_eq!(lines(&mut framer, b"A\xffB\n").as_slice(), &["A?B"]);
    }
}
