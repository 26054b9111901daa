use core::str::FromStr;

use heapless::String;

use super::framer::{LINE_CAPACITY, Line};

/// Maximum length of a URC key, e.g. `CME ERROR` or `QGPSURC`.
pub const URC_KEY_SIZE: usize = 24;

pub type UrcKey = String<URC_KEY_SIZE>;

/// A classified line received from the modem.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseEvent {
    /// Command finished successfully.
    Ok(Line),
    /// Command failed.
    Error(Line),
    /// Module booted and accepts commands (`APP RDY`).
    Ready,
    /// Module is going out of service.
    PowerDown,
    /// Unsolicited notification of the form `+KEY: value`.
    Urc { key: UrcKey, value: Line },
    /// NMEA sentence, stripped of leading noise and of anything after the checksum.
    NmeaSentence(Line),
    Unrecognized,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResponseEvent {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ResponseEvent::Ok(line) => defmt::write!(fmt, "Ok({})", line.as_str()),
            ResponseEvent::Error(line) => defmt::write!(fmt, "Error({})", line.as_str()),
            ResponseEvent::Ready => defmt::write!(fmt, "Ready"),
            ResponseEvent::PowerDown => defmt::write!(fmt, "PowerDown"),
            ResponseEvent::Urc { key, value } => {
                defmt::write!(fmt, "Urc({}={})", key.as_str(), value.as_str())
            }
            ResponseEvent::NmeaSentence(line) => defmt::write!(fmt, "Nmea({})", line.as_str()),
            ResponseEvent::Unrecognized => defmt::write!(fmt, "Unrecognized"),
        }
    }
}

/// Classifies a line received from the modem.
///
/// Rules are checked in order and the first match wins: NMEA sentence, `OK`, `ERROR`, `APP RDY`,
/// `POWER DOWN` and finally a `+KEY: value` URC. Everything else is `Unrecognized`.
pub fn classify(line: &str) -> ResponseEvent {
    if line.contains("$G") || line.contains("$P") {
        return match nmea_sentence(line) {
            Some(sentence) => ResponseEvent::NmeaSentence(sentence),
            None => ResponseEvent::Unrecognized,
        };
    }
    if line.starts_with("OK") {
        to_line(line).map_or(ResponseEvent::Unrecognized, ResponseEvent::Ok)
    } else if line.starts_with("ERROR") {
        to_line(line).map_or(ResponseEvent::Unrecognized, ResponseEvent::Error)
    } else if line.starts_with("APP RDY") {
        ResponseEvent::Ready
    } else if line.contains("POWER DOWN") {
        ResponseEvent::PowerDown
    } else if line.starts_with('+') {
        split_urc(line)
            .and_then(|(key, value)| Some((UrcKey::from_str(key).ok()?, to_line(value)?)))
            .map_or(ResponseEvent::Unrecognized, |(key, value)| {
                ResponseEvent::Urc { key, value }
            })
    } else {
        ResponseEvent::Unrecognized
    }
}

/// Copies `text` into a line, dropping whatever doesn't fit.
fn to_line(text: &str) -> Option<Line> {
    Line::from_str(prefix(text, LINE_CAPACITY)).ok()
}

/// The longest prefix of `text` of at most `len` bytes ending on a character boundary.
fn prefix(text: &str, len: usize) -> &str {
    if len >= text.len() {
        return text;
    }
    let end = (0..=len).rev().find(|idx| text.is_char_boundary(*idx)).unwrap_or(0);
    &text[..end]
}

/// Strips anything before the `$` and after the two checksum characters following `*`.
fn nmea_sentence(line: &str) -> Option<Line> {
    let start = line.find('$')?;
    let mut sentence = &line[start..];
    if let Some(star) = sentence.find('*') {
        sentence = prefix(sentence, star + 3);
    }
    to_line(sentence)
}

/// Splits a `+KEY: value` line into key and value.
///
/// The key ends at the first `:` and a single space after it is skipped.
pub fn split_urc(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('+')?;
    let colon = rest.find(':')?;
    let value = &rest[colon + 1..];
    Some((&rest[..colon], value.strip_prefix(' ').unwrap_or(value)))
}

/// True if a command result reports success.
pub fn is_ok(result: &str) -> bool {
    result.starts_with("OK")
}

/// True if a command result reports a failure, either `ERROR` or `+CME ERROR`.
pub fn is_error(result: &str) -> bool {
    result.starts_with("ERROR") || result.starts_with("+CME ERROR")
}

/// Removes surrounding double quotes, if present.
pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|value| value.strip_suffix('"'))
        .unwrap_or(value)
}
