// fsrtool - GPS track log to flight simulator video converter
// Copyright (C) 2017  Datong Sun (dndx@idndx.com)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use super::{NmeaData, SentenceHandler};
use chrono::prelude::*;
use datum::FixQuality;
use std::result;

type ParseResult<T> = result::Result<T, String>;

/// Recommended minimum data
#[derive(PartialEq, Debug, Clone)]
pub struct Rmc {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground in knots
    pub speed: Option<f64>,
    /// Course over ground, degrees true
    pub course: Option<f64>,
    /// East positive
    pub variation: Option<f64>,
}

/// Fix data
#[derive(PartialEq, Debug, Clone)]
pub struct Gga {
    pub lat: f64,
    pub lon: f64,
    pub quality: FixQuality,
    pub num_sv: Option<u8>,
    pub hdop: Option<f64>,
    /// Altitude above MSL in feet
    pub altitude: f64,
}

fn field<'a>(fields: &[&'a str], i: usize) -> &'a str {
    fields.get(i).map(|f| f.trim()).unwrap_or("")
}

fn number(s: &str) -> ParseResult<f64> {
    s.parse().map_err(|_| format!("invalid number '{}'", s))
}

fn optional(s: &str) -> ParseResult<Option<f64>> {
    if s.is_empty() {
        Ok(None)
    } else {
        number(s).map(Some)
    }
}

/// `ddmm.mmmm` or `dddmm.mmmm` followed by a hemisphere field
fn coordinate(value: &str, hemisphere: &str, degree_digits: usize, negative: &str) -> ParseResult<f64> {
    let bad = || format!("invalid coordinate '{},{}'", value, hemisphere);

    let deg = value.get(..degree_digits).ok_or_else(bad)?;
    let min = value.get(degree_digits..).ok_or_else(bad)?;
    let deg: f64 = deg.parse().map_err(|_| bad())?;
    let min: f64 = min.parse().map_err(|_| bad())?;

    let c = deg + min / 60_f64;
    Ok(if hemisphere == negative { -c } else { c })
}

fn two_digits(s: &str, at: usize) -> ParseResult<u32> {
    s.get(at..at + 2)
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| format!("invalid field '{}'", s))
}

/// `hhmmss(.sss)` and `ddmmyy`, years before 90 are 20yy
fn timestamp(time: &str, date: &str) -> ParseResult<DateTime<Utc>> {
    let hour = two_digits(time, 0)?;
    let minute = two_digits(time, 2)?;
    let seconds = time
        .get(4..)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| format!("invalid time '{}'", time))?;
    let milli = ((seconds.fract() * 1000_f64).round() as u32).min(999);

    let day = two_digits(date, 0)?;
    let month = two_digits(date, 2)?;
    let year = two_digits(date, 4)? as i32;
    let year = year + if year < 90 { 2000 } else { 1900 };

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_milli_opt(hour, minute, seconds.trunc() as u32, milli))
        .map(|t| Utc.from_utc_datetime(&t))
        .ok_or_else(|| format!("invalid date/time '{} {}'", date, time))
}

pub struct RmcHandler;

impl SentenceHandler for RmcHandler {
    fn command(&self) -> &str {
        "GPRMC"
    }

    fn handle(&mut self, fields: &[&str]) -> ParseResult<Option<NmeaData>> {
        if fields.len() < 10 {
            return Err(format!("too few arguments: {} < 10", fields.len()));
        }

        if field(fields, 1) != "A" {
            trace!("RMC without an active fix");
            return Ok(None);
        }

        let variation = match optional(field(fields, 9))? {
            Some(v) if field(fields, 10) == "W" => Some(-v),
            v => v,
        };

        Ok(Some(NmeaData::Rmc(Rmc {
            time: timestamp(field(fields, 0), field(fields, 8))?,
            lat: coordinate(field(fields, 2), field(fields, 3), 2, "S")?,
            lon: coordinate(field(fields, 4), field(fields, 5), 3, "W")?,
            speed: optional(field(fields, 6))?,
            course: optional(field(fields, 7))?,
            variation,
        })))
    }
}

pub struct GgaHandler;

impl SentenceHandler for GgaHandler {
    fn command(&self) -> &str {
        "GPGGA"
    }

    fn handle(&mut self, fields: &[&str]) -> ParseResult<Option<NmeaData>> {
        if fields.len() < 11 {
            return Err(format!("too few arguments: {} < 11", fields.len()));
        }

        let quality = match field(fields, 5).parse::<u8>() {
            Ok(0) => {
                trace!("GGA without a fix");
                return Ok(None);
            }
            // a plain fix does not say whether it is 2D or 3D
            Ok(1) => FixQuality::Unknown,
            Ok(2) => FixQuality::Differential,
            Ok(3) => FixQuality::Pps,
            Ok(_) => FixQuality::Unknown,
            Err(_) => return Err(format!("invalid fix quality '{}'", field(fields, 5))),
        };

        if field(fields, 9) != "M" {
            return Err(format!("altitude unit '{}' is not meters", field(fields, 9)));
        }

        Ok(Some(NmeaData::Gga(Gga {
            lat: coordinate(field(fields, 1), field(fields, 2), 2, "S")?,
            lon: coordinate(field(fields, 3), field(fields, 4), 3, "W")?,
            quality,
            num_sv: field(fields, 6).parse().ok(),
            hdop: optional(field(fields, 7))?,
            altitude: m_to_ft!(number(field(fields, 8))?),
        })))
    }
}
