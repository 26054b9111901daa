use chrono::prelude::*;
use chrono::TimeDelta;
use heapless::{String, format};

use crate::at::response::unquote;
use crate::error::Error;

/// Parses the payload of `+CCLK` into UTC time.
///
/// The modem reports local time as `"YY/MM/DD,HH:MM:SS±TZ"` where `TZ` is the offset from UTC in
/// quarters of an hour. Quotes around the payload are optional.
pub fn parse_cclk(modem_clock: &str) -> Result<NaiveDateTime, Error> {
    let modem_clock = unquote(modem_clock.trim());
    let local = modem_clock.get(..17).ok_or(Error::ParseError)?;
    let naive_date = NaiveDateTime::parse_from_str(local, "%y/%m/%d,%H:%M:%S")
        .map_err(|_| Error::ParseError)?;

    let offset = modem_clock.get(17..).ok_or(Error::ParseError)?;
    let quarters = str::parse::<i8>(offset).map_err(|_| Error::ParseError)?;
    naive_date
        .checked_sub_signed(TimeDelta::minutes(i64::from(quarters) * 15))
        .ok_or(Error::ParseError)
}

/// Formats UTC time the way `AT+QGPSXTRATIME` expects it, `YYYY/MM/DD,hh:mm:ss`.
pub fn format_xtra_time(utc: &NaiveDateTime) -> crate::Result<String<20>> {
    Ok(format!(
        20;
        "{:04}/{:02}/{:02},{:02}:{:02}:{:02}",
        utc.year(),
        utc.month(),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second()
    )?)
}
