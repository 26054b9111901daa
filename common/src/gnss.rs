use chrono::NaiveDate;

/// The latest valid GNSS fix.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GnssFix {
    /// Unix timestamp of the fix, in seconds.
    pub timestamp: i64,
    /// Latitude in degrees, negative on the southern hemisphere.
    pub latitude: f64,
    /// Longitude in degrees, negative on the western hemisphere.
    pub longitude: f64,
    /// Number of valid fixes since the GNSS session started.
    pub fix_count: u32,
}

impl GnssFix {
    /// Updates the fix from an RMC sentence.
    ///
    /// Only valid fixes (status `A`) are applied. Void fixes and malformed sentences are ignored.
    /// Returns true if the fix was updated.
    pub fn update_from_rmc(&mut self, sentence: &str) -> bool {
        match RmcSentence::parse(sentence) {
            Some(rmc) if rmc.valid => {
                self.timestamp = rmc.timestamp;
                self.latitude = rmc.latitude;
                self.longitude = rmc.longitude;
                self.fix_count += 1;
                true
            }
            _ => false,
        }
    }
}

/// Fields of an NMEA RMC sentence relevant for a position fix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RmcSentence {
    pub timestamp: i64,
    pub valid: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl RmcSentence {
    const MIN_FIELDS: usize = 10;

    /// Parses e.g. `$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A`.
    pub fn parse(sentence: &str) -> Option<Self> {
        let sentence = sentence.split('*').next()?;
        let mut fields: heapless::Vec<&str, 16> = heapless::Vec::new();
        for field in sentence.split(',') {
            if fields.push(field).is_err() {
                break;
            }
        }
        if fields.len() < Self::MIN_FIELDS || !fields[0].ends_with("RMC") {
            return None;
        }

        let (hour, minute, second) = split_hhmmss(fields[1])?;
        let valid = match fields[2] {
            "A" => true,
            "V" => false,
            _ => return None,
        };
        let latitude = to_degrees(fields[3], fields[4], 'N', 'S')?;
        let longitude = to_degrees(fields[5], fields[6], 'E', 'W')?;
        let (day, month, year) = split_hhmmss(fields[9])?;
        let timestamp = NaiveDate::from_ymd_opt(2000 + i32::from(year), month.into(), day.into())?
            .and_hms_opt(hour.into(), minute.into(), second.into())?
            .and_utc()
            .timestamp();

        Some(Self {
            timestamp,
            valid,
            latitude,
            longitude,
        })
    }
}

/// Splits the first six digits into three two-digit numbers, e.g. `hhmmss` or `ddmmyy`.
fn split_hhmmss(field: &str) -> Option<(u8, u8, u8)> {
    let digits = field.get(..6)?;
    let part = |idx: usize| str::parse::<u8>(digits.get(idx..idx + 2)?).ok();
    Some((part(0)?, part(2)?, part(4)?))
}

/// Converts an NMEA `(d)ddmm.mmmm` value into decimal degrees.
fn to_degrees(raw: &str, hemisphere: &str, positive: char, negative: char) -> Option<f64> {
    let raw = str::parse::<f64>(raw).ok().filter(|raw| *raw >= 0.0)?;
    let sign = match hemisphere.chars().next()? {
        ch if ch == positive => 1.0,
        ch if ch == negative => -1.0,
        _ => return None,
    };
    // Truncation is floor for non-negative values
    let degrees = ((raw / 100.0) as u32) as f64;
    let minutes = raw - degrees * 100.0;
    Some(sign * (degrees + minutes / 60.0))
}

#[cfg(test)]
mod test_gnss {
    use super::*;

    const VALID: &str = "$GPRMC,123519,A,4023.4180,N,07948.6180,W,022.4,084.4,230324,003.1,W*6A";

    fn close(a: f64, b: f64) -> bool {
        let diff = a - b;
        diff < 1e-6 && diff > -1e-6
    }

    #[test]
    fn test_degrees() {
        assert!(close(to_degrees("4023.4180", "N", 'N', 'S').unwrap(), 40.3903));
        assert!(close(to_degrees("07948.6180", "W", 'E', 'W').unwrap(), -79.8103));
        assert!(close(to_degrees("4807.038", "S", 'N', 'S').unwrap(), -48.1173));
        assert_eq!(to_degrees("4807.038", "X", 'N', 'S'), None);
        assert_eq!(to_degrees("", "N", 'N', 'S'), None);
    }

    #[test]
    fn test_valid_fix() {
        let mut fix = GnssFix::default();
        assert!(fix.update_from_rmc(VALID));
        assert_eq!(fix.fix_count, 1);
        assert!(close(fix.latitude, 40.3903));
        assert!(close(fix.longitude, -79.8103));
        // 2024-03-23 12:35:19 UTC
        assert_eq!(fix.timestamp, 1_711_197_319);

        assert!(fix.update_from_rmc(VALID));
        assert_eq!(fix.fix_count, 2);
    }

    #[test]
    fn test_void_fix() {
        let mut fix = GnssFix::default();
        fix.update_from_rmc(VALID);
        let before = fix;
        let void = "$GNRMC,123520,V,4807.038,N,01131.000,E,022.4,084.4,230324,003.1,W*6A";
        assert!(RmcSentence::parse(void).is_some());
        assert!(!fix.update_from_rmc(void));
        assert_eq!(fix, before);
    }

    #[test]
    fn test_malformed() {
        let mut fix = GnssFix::default();
        assert!(!fix.update_from_rmc("$GPRMC,123519,A,4807.038,N"));
        assert!(!fix.update_from_rmc("$GPRMC,,A,4807.038,N,01131.000,E,,,230394,,"));
        assert!(!fix.update_from_rmc("$GPRMC,123519,A,4807.038,N,01131.000,E,,,320394,,"));
        assert!(!fix.update_from_rmc("$GPGGA,123519,A,4807.038,N,01131.000,E,,,230394,,"));
        assert_eq!(fix, GnssFix::default());
    }

    #[test]
    fn test_fractional_time() {
        let rmc = RmcSentence::parse("$GNRMC,000001.00,A,0000.0000,N,00000.0000,E,,,010100,,")
            .unwrap();
        assert_eq!(rmc.timestamp, 946_684_801);
        assert!(rmc.valid);
    }
}
