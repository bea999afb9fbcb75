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

use chrono::prelude::*;
use error::{Error, Result};
use serde_json;
use std::io::Read;

/// Frame rate the host assumes when none is given
pub const DEFAULT_TICKS_PER_SECOND: f64 = 18_f64;

/// Settings for a track conversion. Every field may be left out of the
/// JSON form.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxiliaryData {
    /// Stored in the trailer
    pub name: String,
    /// Stored in the trailer
    pub description: String,
    pub ticks_per_second: f64,
    /// Seconds of track skipped before the first frame
    pub start_second: f64,
    /// Seconds of track converted after `start_second`, unbounded if absent
    pub total_seconds: Option<f64>,
    /// Replaces the time of the first sample, later samples keep their offsets
    pub start_time: Option<DateTime<Utc>>,
    /// Altitude in feet at or below which the aircraft sits on the ground
    pub minimum_altitude: Option<f64>,
    /// Hold heading and airspeed while the aircraft is not moving
    pub jitter_reduction: bool,
    /// Send position and altitude in every frame, changed or not
    pub always_send_position: bool,
}

impl Default for AuxiliaryData {
    fn default() -> Self {
        AuxiliaryData {
            name: String::new(),
            description: String::new(),
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            start_second: 0_f64,
            total_seconds: None,
            start_time: None,
            minimum_altitude: None,
            jitter_reduction: true,
            always_send_position: true,
        }
    }
}

impl AuxiliaryData {
    pub fn from_reader<R: Read>(r: R) -> Result<Self> {
        let aux: AuxiliaryData = serde_json::from_reader(r)?;
        aux.validate()?;
        Ok(aux)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.ticks_per_second.is_finite() && self.ticks_per_second > 0_f64) {
            return Err(Error::InvalidConfig(format!(
                "ticks per second must be positive, got {}",
                self.ticks_per_second
            )));
        }

        if !self.start_second.is_finite() || self.start_second < 0_f64 {
            return Err(Error::InvalidConfig(format!(
                "start second must not be negative, got {}",
                self.start_second
            )));
        }

        if let Some(t) = self.total_seconds {
            if t.is_nan() || t < 0_f64 {
                return Err(Error::InvalidConfig(format!(
                    "total seconds must not be negative, got {}",
                    t
                )));
            }
        }

        Ok(())
    }
}
