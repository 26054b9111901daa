use core::fmt::Write;
use core::str::FromStr;

use heapless::{String, Vec};

use crate::at::framer::Line;
use crate::at::response::UrcKey;
use crate::error::Error;

/// Maximum number of distinct URC keys kept at the same time.
pub const URC_CAPACITY: usize = 24;

/// Key of the network registration URC.
pub const CEREG: &str = "CEREG";
/// Key of the extended error URC, reported both as a URC and as a command result.
pub const CME_ERROR: &str = "CME ERROR";

/// Latest payload of every unsolicited result code received from the modem.
///
/// Keys are unique, the last write wins and the insertion order is kept for [`UrcStore::dump`].
/// Once [`URC_CAPACITY`] keys are stored, a new key evicts the oldest one other than `CEREG`.
/// The network registration status is derived from the `CEREG` entry on every update.
#[derive(Default)]
pub struct UrcStore {
    entries: Vec<(UrcKey, Line), URC_CAPACITY>,
    registered: bool,
}

impl UrcStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous payload.
    pub fn update(&mut self, key: &str, value: &str) -> crate::Result<()> {
        let value = Line::from_str(value).map_err(|_| Error::BufferTooSmallError)?;
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, old)) => *old = value,
            None => {
                let key = UrcKey::from_str(key).map_err(|_| Error::BufferTooSmallError)?;
                if self.entries.is_full() {
                    self.evict_oldest();
                }
                self.entries.push((key, value)).map_err(|_| Error::BufferTooSmallError)?;
            }
        }
        if key == CEREG {
            self.registered = is_registered(self.get(CEREG));
        }
        Ok(())
    }

    /// Drops the oldest entry to make room, `CEREG` is always kept.
    fn evict_oldest(&mut self) {
        if let Some(pos) = self.entries.iter().position(|(k, _)| k != CEREG) {
            self.entries.remove(pos);
        }
    }

    /// Returns the latest payload for `key` or an empty string.
    pub fn get(&self, key: &str) -> &str {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn erase(&mut self, key: &str) {
        if let Some(pos) = self.entries.iter().position(|(k, _)| k == key) {
            self.entries.remove(pos);
        }
        if key == CEREG {
            self.registered = false;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.registered = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the last `CEREG` payload reports home (1) or roaming (5) registration.
    pub fn registered(&self) -> bool {
        self.registered
    }

    /// Concatenates all entries as `KEY=value ` pairs, in insertion order.
    ///
    /// Entries that do not fit into `N` bytes are left out.
    pub fn dump<const N: usize>(&self) -> String<N> {
        let mut out = String::new();
        for (key, value) in &self.entries {
            if write!(out, "{}={} ", key.as_str(), value.as_str()).is_err() {
                break;
            }
        }
        out
    }
}

fn is_registered(cereg: &str) -> bool {
    matches!(cereg.chars().last(), Some('1') | Some('5'))
}

/// Error codes of the BG77xA-GL & BG95xA-GL GNSS application note.
static GNSS_ERRORS: [(&str, &str); 23] = [
    ("501", "Invalid parameter"),
    ("502", "Operation not supported"),
    ("503", "GNSS subsystem busy"),
    ("504", "Session is ongoing"),
    ("505", "Session not active"),
    ("506", "Operation timeout"),
    ("507", "Function not enabled"),
    ("508", "Time information error"),
    ("509", "XTRA not enabled"),
    ("512", "Validity time is out of range"),
    ("513", "Internal resource error"),
    ("514", "GNSS locked"),
    ("515", "End by E911"),
    ("516", "No fix"),
    ("517", "Geo-fence ID does not exist"),
    ("518", "Sync time failed"),
    ("519", "XTRA file does not exist"),
    ("520", "XTRA file on downloading"),
    ("521", "XTRA file is valid"),
    ("522", "GNSS is working"),
    ("523", "Time injection error"),
    ("524", "XTRA file is invalid"),
    ("549", "Unknown error"),
];

/// Description of a GNSS `+CME ERROR` code.
pub fn gnss_error_description(code: &str) -> &'static str {
    GNSS_ERRORS
        .iter()
        .find(|(c, _)| *c == code.trim())
        .map(|(_, description)| *description)
        .unwrap_or("Unknown error code")
}

#[cfg(test)]
mod test_urc {
    use super::*;

    #[test]
    fn test_registration() {
        let mut urcs = UrcStore::new();
        assert!(!urcs.registered());
        for (value, registered) in [
            ("1", true),
            ("5", true),
            ("2,1", true),
            ("0", false),
            ("2", false),
            ("3", false),
            ("4", false),
            ("6", false),
            ("8", false),
            ("", false),
            ("1,5", true),
        ] {
            urcs.update(CEREG, value).unwrap();
            assert_eq!(urcs.registered(), registered, "CEREG: {value}");
        }
        urcs.update(CEREG, "5").unwrap();
        urcs.erase(CEREG);
        assert!(!urcs.registered());
    }

    #[test]
    fn test_other_keys_do_not_register() {
        let mut urcs = UrcStore::new();
        urcs.update("CGATT", "1").unwrap();
        assert!(!urcs.registered());
    }

    #[test]
    fn test_last_write_wins() {
        let mut urcs = UrcStore::new();
        urcs.update("QMTOPEN", "0,1").unwrap();
        urcs.update("QMTOPEN", "0,0").unwrap();
        assert_eq!(urcs.get("QMTOPEN"), "0,0");
        assert_eq!(urcs.len(), 1);
        assert_eq!(urcs.get("QMTCONN"), "");
        assert!(!urcs.contains("QMTCONN"));
    }

    #[test]
    fn test_dump_keeps_insertion_order() {
        let mut urcs = UrcStore::new();
        urcs.update("CEREG", "1").unwrap();
        urcs.update("QGPSURC", "\"XTRA_DL\",0").unwrap();
        urcs.update("CPIN", "READY").unwrap();
        urcs.erase("QGPSURC");
        urcs.update("CEREG", "5").unwrap();
        assert_eq!(urcs.dump::<64>(), "CEREG=5 CPIN=READY ");

        urcs.clear();
        assert!(urcs.is_empty());
        assert!(!urcs.registered());
        assert_eq!(urcs.dump::<64>(), "");
    }

    #[test]
    fn test_capacity() {
        let mut urcs = UrcStore::new();
        let too_long = "KKKKKKKKKKKKKKKKKKKKKKKKKKKKKK";
        assert_eq!(urcs.update(too_long, "1"), Err(Error::BufferTooSmallError));
        urcs.update(CEREG, "5").unwrap();
        for i in 1..URC_CAPACITY {
            let key = heapless::format!(8; "KEY{i}").unwrap();
            urcs.update(&key, "1").unwrap();
        }
        assert_eq!(urcs.len(), URC_CAPACITY);

        // Existing keys are updated in place
        assert_eq!(urcs.update("KEY1", "2"), Ok(()));
        assert_eq!(urcs.len(), URC_CAPACITY);

        assert_eq!(urcs.update("EXTRA", "1"), Ok(()));
        assert_eq!(urcs.len(), URC_CAPACITY);
        assert_eq!(urcs.get("EXTRA"), "1");
        assert!(!urcs.contains("KEY1"));
        assert!(urcs.contains("KEY2"));
        assert!(urcs.registered());

        assert_eq!(urcs.update("QMTOPEN", "0,0"), Ok(()));
        assert!(!urcs.contains("KEY2"));
        assert_eq!(urcs.get(CEREG), "5");
    }

    #[test]
    fn test_gnss_error_description() {
        assert_eq!(gnss_error_description("516"), "No fix");
        assert_eq!(gnss_error_description("549"), "Unknown error");
        assert_eq!(gnss_error_description("510"), "Unknown error code");
        assert_eq!(gnss_error_description("garbage"), "Unknown error code");
    }
}
