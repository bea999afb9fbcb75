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

//! Track log readers. Each one turns an input stream into a sequence of
//! [`TrackSample`]s pushed into a handle, in non-decreasing time order.

use chrono::prelude::*;
use error::Result;
use handle::Pushable;
use progress::ProgressRead;

pub mod ctl;
pub mod gpx;
pub mod nmea;
pub mod pdb;
pub mod pnl;

#[derive(PartialEq, Debug, Copy, Clone, Serialize)]
pub enum FixQuality {
    NoFix,
    TwoDim,
    ThreeDim,
    Differential,
    Pps,
    Unknown,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct TrackSample {
    /// Time this position was taken (UTC)
    pub time: DateTime<Utc>,
    /// Latitude in degrees, north positive
    pub lat: f64,
    /// Longitude in degrees, east positive
    pub lon: f64,
    /// Altitude above MSL in feet
    pub altitude: Option<f64>,
    /// Ground speed in knots
    pub ground_speed: Option<f64>,
    /// Course over ground in degrees true
    pub true_course: Option<f64>,
    /// Magnetic variation in degrees, east positive
    pub mag_variation: Option<f64>,
    pub fix: FixQuality,
    /// Number of SVs used in fix
    pub num_sv: Option<u8>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
}

impl TrackSample {
    pub fn new(time: DateTime<Utc>, lat: f64, lon: f64) -> Self {
        TrackSample {
            time,
            lat,
            lon,
            altitude: None,
            ground_speed: None,
            true_course: None,
            mag_variation: None,
            fix: FixQuality::Unknown,
            num_sv: None,
            hdop: None,
            vdop: None,
        }
    }

    /// Course in degrees magnetic, in [0, 360)
    pub fn magnetic_course(&self) -> Option<f64> {
        match (self.true_course, self.mag_variation) {
            (Some(c), Some(v)) => {
                // rounds up to 360 for tiny negative differences
                let m = (c - v).rem_euclid(360_f64);
                Some(if m >= 360_f64 { 0_f64 } else { m })
            }
            _ => None,
        }
    }
}

pub trait DatumProducer {
    /// Read the whole input, pushing every usable sample into `h` and
    /// reporting progress through it along the way
    fn parse(&mut self, input: &mut dyn ProgressRead, h: &mut dyn Pushable<TrackSample>) -> Result<()>;
}
