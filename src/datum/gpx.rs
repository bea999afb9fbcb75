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

use super::{DatumProducer, FixQuality, TrackSample};
use chrono::prelude::*;
use error::{Error, Result};
use handle::Pushable;
use progress::ProgressRead;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufReader;
use std::str::FromStr;

/// Track points nested this deep are read: `gpx/trk/trkseg/trkpt`
const TRKPT_DEPTH: usize = 3;

#[derive(Default)]
struct Point {
    lat: f64,
    lon: f64,
    time: Option<DateTime<Utc>>,
    altitude: Option<f64>,
    speed: Option<f64>,
    course: Option<f64>,
    magvar: Option<f64>,
    hdop: Option<f64>,
    vdop: Option<f64>,
    sat: Option<u8>,
    fix: Option<FixQuality>,
}

fn number<T: FromStr>(element: &str, s: &str) -> Result<T> {
    s.parse()
        .map_err(|_| Error::invalid(format!("invalid <{}> value '{}'", element, s)))
}

impl Point {
    fn start(e: &BytesStart) -> Result<Point> {
        let mut p = Point::default();
        let (mut lat, mut lon) = (None, None);

        for a in e.attributes() {
            let a = a?;
            let v = a
                .unescape_value()
                .map_err(|e| Error::invalid(e.to_string()))?;
            match a.key.local_name().as_ref() {
                b"lat" => lat = Some(number("trkpt", v.trim())?),
                b"lon" => lon = Some(number("trkpt", v.trim())?),
                _ => {}
            }
        }

        match (lat, lon) {
            (Some(lat), Some(lon)) => {
                p.lat = lat;
                p.lon = lon;
                Ok(p)
            }
            _ => Err(Error::invalid("<trkpt> without lat/lon")),
        }
    }

    fn set(&mut self, element: &str, text: &str) -> Result<()> {
        let text = text.trim();
        match element {
            "ele" => self.altitude = Some(m_to_ft!(number::<f64>(element, text)?)),
            "time" => {
                let t = DateTime::parse_from_rfc3339(text)
                    .map_err(|_| Error::invalid(format!("invalid <time> value '{}'", text)))?;
                self.time = Some(t.with_timezone(&Utc));
            }
            "course" => self.course = Some(number(element, text)?),
            "speed" => self.speed = Some(mps_to_kts!(number::<f64>(element, text)?)),
            "magvar" => self.magvar = Some(number(element, text)?),
            "hdop" => self.hdop = Some(number(element, text)?),
            "vdop" => self.vdop = Some(number(element, text)?),
            "sat" => self.sat = Some(number(element, text)?),
            "fix" => {
                self.fix = Some(match text {
                    "none" => FixQuality::NoFix,
                    "2d" => FixQuality::TwoDim,
                    "3d" => FixQuality::ThreeDim,
                    "dgps" => FixQuality::Differential,
                    "pps" => FixQuality::Pps,
                    _ => {
                        warn!("unknown GPX fix type '{}'", text);
                        FixQuality::Unknown
                    }
                })
            }
            _ => trace!("ignoring <{}> in track point", element),
        }

        Ok(())
    }

    fn into_sample(self) -> Option<TrackSample> {
        let time = match self.time {
            Some(t) => t,
            None => {
                warn!("skipping track point at {},{} without time", self.lat, self.lon);
                return None;
            }
        };

        if self.fix == Some(FixQuality::NoFix) {
            debug!("skipping track point at {} without fix", time);
            return None;
        }

        let mut s = TrackSample::new(time, self.lat, self.lon);
        s.altitude = self.altitude;
        s.ground_speed = self.speed;
        s.true_course = self.course;
        s.mag_variation = self.magvar;
        s.fix = self.fix.unwrap_or(FixQuality::Unknown);
        s.num_sv = self.sat;
        s.hdop = self.hdop;
        s.vdop = self.vdop;
        Some(s)
    }
}

/// Track samples from a GPS eXchange file. Waypoints and routes are ignored.
pub struct GpxReader;

impl GpxReader {
    fn on_trkpt_path(path: &[Vec<u8>]) -> bool {
        path.len() == TRKPT_DEPTH && path[1] == b"trk" && path[2] == b"trkseg"
    }
}

impl DatumProducer for GpxReader {
    fn parse(&mut self, input: &mut dyn ProgressRead, h: &mut dyn Pushable<TrackSample>) -> Result<()> {
        let mut reader = Reader::from_reader(BufReader::new(input));
        let mut buf = Vec::new();

        let mut path: Vec<Vec<u8>> = vec![];
        let mut seen_root = false;
        let mut point: Option<Point> = None;
        let mut text = String::new();

        loop {
            buf.clear();
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e) if path.is_empty() => {
                    if e.local_name().as_ref() != b"gpx" {
                        return Err(Error::invalid("not a GPX document"));
                    }
                    seen_root = true;
                    path.push(b"gpx".to_vec());
                }
                Event::Start(ref e) => {
                    let name = e.local_name().as_ref().to_vec();
                    if name == b"trkpt" && GpxReader::on_trkpt_path(&path) {
                        point = Some(Point::start(e)?);
                    }
                    path.push(name);
                    text.clear();
                }
                Event::Empty(ref e) => {
                    if e.local_name().as_ref() == b"trkpt" && GpxReader::on_trkpt_path(&path) {
                        if let Some(s) = Point::start(e)?.into_sample() {
                            h.push_data(s)?;
                        }
                    }
                }
                Event::Text(ref t) => {
                    if point.is_some() {
                        let t = t.unescape().map_err(|e| Error::invalid(e.to_string()))?;
                        text.push_str(&t);
                    }
                }
                Event::End(_) => {
                    let name = path.pop().unwrap_or_default();

                    if path.len() == TRKPT_DEPTH + 1 {
                        if let Some(ref mut p) = point {
                            p.set(&String::from_utf8_lossy(&name), &text)?;
                        }
                    } else if path.len() == TRKPT_DEPTH && name == b"trkpt" {
                        if let Some(s) = point.take().and_then(Point::into_sample) {
                            h.push_data(s)?;
                        }
                        let fraction = reader.get_ref().get_ref().fraction_read();
                        h.report_progress(fraction)?;
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(Error::invalid("not a GPX document"));
        }

        Ok(())
    }
}
