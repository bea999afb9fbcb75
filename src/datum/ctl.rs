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

//! Cetus GPS track logs, a PalmOS database of `DBLK` blocks. Each block
//! holds fixed size sub-records: the first is the track information, the
//! next two the description, every one after that a track point.

use super::pdb;
use super::{DatumProducer, FixQuality, TrackSample};
use chrono::prelude::*;
use chrono::Duration;
use error::{Error, Result};
use handle::Pushable;
use nom::bytes::complete::{tag, take};
use nom::number::complete::{be_i32, be_i8, be_u16, be_u8};
use nom::sequence::tuple;
use nom::IResult;
use progress::ProgressRead;

const DB_TYPE: &[u8; 4] = b"strm";
const BLOCK_HEADER_SIZE: usize = 8;
const RECORD_SIZE: usize = 22;
const TRACK_VERSION: u8 = 3;

#[derive(Debug)]
struct TrackInfo {
    version: u8,
    interval: u8,
    gps: u16,
    /// Years since 2000
    year: u8,
    month: u8,
    day: u8,
    hour: u8,
    /// Hours from UTC the user had configured
    time_offset: i8,
}

#[derive(Debug)]
struct Point {
    /// Fix in bits 5-7, hour in bits 0-4
    status: u8,
    minute: u8,
    second: u8,
    centisecond: u8,
    sat: u8,
    /// HDOP * 10
    hdop: u8,
    /// Degrees * 10^7
    lat: i32,
    lon: i32,
    /// Knots * 10
    speed: u16,
    /// Degrees * 10
    course: u16,
    /// Meters * 100
    altitude: i32,
}

fn block_header(i: &[u8]) -> IResult<&[u8], i32> {
    let (i, _) = tag("DBLK")(i)?;
    be_i32(i)
}

fn track_info(i: &[u8]) -> IResult<&[u8], TrackInfo> {
    let (i, _) = tag("CG")(i)?;
    let (i, (version, interval, gps)) = tuple((be_u8, be_u8, be_u16))(i)?;
    let (i, (year, month, day, hour)) = tuple((be_u8, be_u8, be_u8, be_u8))(i)?;
    // start minute, second and 1/100 second
    let (i, _) = take(3_usize)(i)?;
    let (i, time_offset) = be_i8(i)?;

    Ok((
        i,
        TrackInfo {
            version,
            interval,
            gps,
            year,
            month,
            day,
            hour,
            time_offset,
        },
    ))
}

fn point(i: &[u8]) -> IResult<&[u8], Point> {
    let (i, (status, minute, second, centisecond, sat, hdop)) =
        tuple((be_u8, be_u8, be_u8, be_u8, be_u8, be_u8))(i)?;
    let (i, (lat, lon, speed, course, altitude)) = tuple((be_i32, be_i32, be_u16, be_u16, be_i32))(i)?;

    Ok((
        i,
        Point {
            status,
            minute,
            second,
            centisecond,
            sat,
            hdop,
            lat,
            lon,
            speed,
            course,
            altitude,
        },
    ))
}

fn fix_quality(status: u8) -> Option<FixQuality> {
    match status >> 5 {
        2 => Some(FixQuality::TwoDim),
        3 => Some(FixQuality::ThreeDim),
        4 => Some(FixQuality::Differential),
        _ => None,
    }
}

/// Track samples from a Cetus GPS track log
#[derive(Default)]
pub struct CtlReader {
    record_no: usize,
    start: Option<NaiveDate>,
    description: Vec<u8>,
    prev_hour: u32,
    days_passed: i64,
}

impl CtlReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn block(&mut self, data: &[u8], h: &mut dyn Pushable<TrackSample>) -> Result<()> {
        let (_, len) = block_header(data).map_err(|_| Error::invalid("track log block without 'DBLK' header"))?;
        if len < 0 {
            return Err(Error::invalid(format!("track log block has negative length {}", len)));
        }

        let body = &data[BLOCK_HEADER_SIZE..];
        let len = (len as usize).min(body.len());

        for rec in body[..len].chunks_exact(RECORD_SIZE) {
            self.record_no += 1;

            match self.record_no {
                1 => self.info(rec)?,
                2 => self.description.extend_from_slice(rec),
                3 => {
                    self.description.extend_from_slice(&rec[..3]);
                    debug!("track description '{}'", pdb::zero_terminated(&self.description));
                }
                _ => {
                    let (_, p) = point(rec).map_err(|_| Error::invalid("malformed track point"))?;
                    if let Some(s) = self.sample(&p)? {
                        h.push_data(s)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn info(&mut self, rec: &[u8]) -> Result<()> {
        let (_, info) = track_info(rec).map_err(|_| Error::invalid("track log does not start with a 'CG' record"))?;
        if info.version != TRACK_VERSION {
            return Err(Error::invalid(format!(
                "Cetus track log version {} is not {}",
                info.version, TRACK_VERSION
            )));
        }

        debug!(
            "track log started 20{:02}-{:02}-{:02} {:02}h, interval {}, GPS type {}, UTC offset {}h",
            info.year, info.month, info.day, info.hour, info.interval, info.gps, info.time_offset
        );

        self.start = Some(
            NaiveDate::from_ymd_opt(2000 + info.year as i32, info.month as u32, info.day as u32)
                .ok_or_else(|| Error::invalid("track log has an invalid start date"))?,
        );
        self.prev_hour = info.hour as u32;

        Ok(())
    }

    fn sample(&mut self, p: &Point) -> Result<Option<TrackSample>> {
        let start = self
            .start
            .ok_or_else(|| Error::invalid("track point before track information"))?;

        let fix = match fix_quality(p.status) {
            Some(f) => f,
            None => {
                trace!("skipping track point without fix, status {:#x}", p.status);
                return Ok(None);
            }
        };

        // points are in time order, an earlier hour means the day changed
        let hour = (p.status & 0x1f) as u32;
        if hour < self.prev_hour {
            self.days_passed += 1;
        }
        self.prev_hour = hour;

        let time = match start.and_hms_milli_opt(
            hour,
            p.minute as u32,
            p.second as u32,
            p.centisecond as u32 * 10,
        ) {
            Some(t) => Utc.from_utc_datetime(&t) + Duration::days(self.days_passed),
            None => {
                warn!(
                    "skipping track point with invalid time {}:{}:{}",
                    hour, p.minute, p.second
                );
                return Ok(None);
            }
        };

        let mut s = TrackSample::new(time, p.lat as f64 / 1e7, p.lon as f64 / 1e7);
        s.altitude = Some(m_to_ft!(p.altitude as f64 / 100_f64));
        s.ground_speed = Some(p.speed as f64 / 10_f64);
        s.true_course = Some(p.course as f64 / 10_f64);
        s.fix = fix;
        s.num_sv = Some(p.sat);
        s.hdop = Some(p.hdop as f64 / 10_f64);

        Ok(Some(s))
    }
}

impl DatumProducer for CtlReader {
    fn parse(&mut self, input: &mut dyn ProgressRead, h: &mut dyn Pushable<TrackSample>) -> Result<()> {
        *self = CtlReader::new();

        pdb::read_records(input, DB_TYPE, |rec| {
            trace!("track log block {}, {} bytes", rec.index, rec.data.len());
            self.block(rec.data, h)?;
            h.report_progress(rec.progress)
        })?;

        Ok(())
    }
}
