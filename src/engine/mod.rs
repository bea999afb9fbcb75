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

//! Turns a stream of track samples into simulator video frames.
//!
//! A GPS reports about once a second while the host replays a frame every
//! tick, so each new sample is approached from the last frame sent in
//! equal steps. Bank and pitch are not recorded by a GPS, they are guessed
//! from the turn rate and the climb rate.

use chrono::prelude::*;
use chunk::{Chunk, ChunkSink};
use datum::{DatumProducer, TrackSample};
use error::Result;
use handle::{Handle, Pushable};
use progress::{Progress, ProgressRead};
use property::PropertyId::*;
use property::{DataItemId, ObjectId, PropertyDictionary, PropertyId, PropertyValues, Value};
use utils::{hdg_difference, hdg_range_guard};

pub mod auxiliary;

pub use self::auxiliary::AuxiliaryData;

/// Seconds from 0001-01-01T00:00:00Z to the Unix epoch
const EPOCH_OFFSET: f64 = 62_135_596_800_f64;

/// At or below this airspeed (kt) heading and airspeed are held
const JITTER_AIRSPEED: f64 = 1_f64;
/// Nose up limit, pitch is negative when climbing
const MAX_CLIMB_PITCH: f64 = -15_f64;
const MAX_DESCENT_PITCH: f64 = 7_f64;
const MAX_BANK: f64 = 60_f64;

/// Sent in every frame when `always_send_position` is set
const POSITION: [PropertyId; 3] = [PlaneLatitude, PlaneLongitude, PlaneAltitude];

/// Seconds since 0001-01-01T00:00:00Z, the time base of the host
pub fn absolute_time(t: &DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + EPOCH_OFFSET + f64::from(t.timestamp_subsec_nanos()) / 1e9
}

/// Where the track puts the aircraft at `atime`
#[derive(Debug, Copy, Clone)]
struct Target {
    atime: f64,
    lat: f64,
    lon: f64,
    altitude: f64,
    /// `None` until some sample has reported it
    heading_true: Option<f64>,
    heading_magnetic: Option<f64>,
    airspeed: Option<f64>,
}

impl Target {
    /// Anything `s` lacks is carried over from `prev`
    fn new(s: &TrackSample, atime: f64, prev: Option<&Target>) -> Self {
        let carry = |v: Option<f64>, f: fn(&Target) -> Option<f64>| v.or_else(|| prev.and_then(f));

        Target {
            atime,
            lat: s.lat,
            lon: s.lon,
            altitude: carry(s.altitude, |t| Some(t.altitude)).unwrap_or(0_f64),
            heading_true: carry(s.true_course, |t| t.heading_true),
            heading_magnetic: carry(s.magnetic_course(), |t| t.heading_magnetic),
            airspeed: carry(s.ground_speed, |t| t.airspeed),
        }
    }
}

/// Receives samples from a datum producer and writes frames into the open
/// data record of `sink`
pub struct Engine<'a, 'p> {
    sink: &'a mut dyn ChunkSink,
    progress: &'a mut Progress<'p>,
    aux: &'a AuxiliaryData,
    dict: PropertyDictionary,
    /// frame being built
    values: PropertyValues,
    /// last value sent for every property
    sent: PropertyValues,
    target: Option<Target>,
    bfib: Option<Chunk>,
    frame_no: u32,
    ticks: u32,
    /// time of the first sample, start and total seconds count from it
    origin: Option<f64>,
    /// time of the first sample before it is moved to `forced_start`
    track_start: Option<f64>,
    forced_start: Option<f64>,
    /// the first frame always carries SIM ON GROUND
    ground_state_sent: bool,
    /// last fraction of the input reported by the producer
    fraction: f64,
}

impl<'a, 'p> Engine<'a, 'p> {
    fn new(
        sink: &'a mut dyn ChunkSink,
        progress: &'a mut Progress<'p>,
        aux: &'a AuxiliaryData,
        bfib: Chunk,
    ) -> Self {
        let dict = PropertyDictionary::fs2002();
        let mut values = PropertyValues::new(&dict);
        let mut sent = PropertyValues::new(&dict);

        // never changes, differs from the sent value so it goes out once
        values.set(GForce, Value::Double(1_f64));
        sent.set(GForce, Value::Double(0_f64));

        Engine {
            sink,
            progress,
            aux,
            dict,
            values,
            sent,
            target: None,
            bfib: Some(bfib),
            frame_no: 0,
            ticks: 0,
            origin: None,
            track_start: None,
            forced_start: aux.start_time.as_ref().map(absolute_time),
            ground_state_sent: false,
            fraction: 0_f64,
        }
    }

    /// Hands back the open data record and the number of frames written
    fn finish(self) -> (Option<Chunk>, u32) {
        (self.bfib, self.frame_no)
    }

    fn sent_or(&self, id: PropertyId, default: f64) -> f64 {
        if self.sent.is_written(id) {
            self.sent.f64(id)
        } else {
            default
        }
    }

    /// Close the current data record and open a new one, so frames reach a
    /// live host without waiting for the end of the file
    fn next_record(&mut self) -> Result<()> {
        if let Some(bfib) = self.bfib.take() {
            self.sink.bfib_end(bfib)?;
        }
        self.bfib = Some(self.sink.bfib_start()?);
        Ok(())
    }

    /// Move from the last frame sent to `to`, heading `heading` at
    /// `airspeed` knots
    fn flush(&mut self, to: Target, heading: f64, airspeed: f64) -> Result<()> {
        let tps = self.aux.ticks_per_second;

        let time_from = if self.sent.is_written(AbsoluteTime) {
            self.sent.f64(AbsoluteTime)
        } else {
            // nothing sent yet, step once onto the first sample
            if self.origin.is_none() {
                self.origin = Some(to.atime);
            }
            to.atime - 1_f64 / tps
        };

        let dt = to.atime - time_from;
        if !(dt > 0_f64) {
            debug!(
                "sample at {:.3} does not advance past {:.3}, no frames",
                to.atime, time_from
            );
            return Ok(());
        }

        let lat_from = self.sent_or(PlaneLatitude, to.lat);
        let d_lat = to.lat - lat_from;
        let lon_from = self.sent_or(PlaneLongitude, to.lon);
        let d_lon = to.lon - lon_from;
        let alt_from = self.sent_or(PlaneAltitude, to.altitude);
        let d_alt = to.altitude - alt_from;
        let hdg_from = self.sent_or(PlaneHeadingDegreesTrue, heading);
        let d_hdg = hdg_difference(hdg_from, heading);
        let magnetic = to.heading_magnetic.map(|m| {
            let from = self.sent_or(PlaneHeadingDegreesMagnetic, m);
            (from, hdg_difference(from, m))
        });
        let as_from = self.sent_or(AirspeedIndicated, airspeed);
        let d_as = airspeed - as_from;

        let pitch_from = self.sent.f64(PlanePitchDegrees);
        let pitch_to = if d_alt > 0_f64 {
            (-(d_alt / dt) / 2.2).max(MAX_CLIMB_PITCH)
        } else if d_alt < 0_f64 {
            (-(d_alt / dt) / 4.7).min(MAX_DESCENT_PITCH)
        } else {
            0_f64
        };
        let d_pitch = pitch_to - pitch_from;

        let bank_from = self.sent.f64(PlaneBankDegrees);
        let bank_to = if d_hdg != 0_f64 {
            (-((d_hdg / dt) / 3_f64) * (airspeed / 10_f64 + 7_f64))
                .max(-MAX_BANK)
                .min(MAX_BANK)
        } else {
            0_f64
        };
        let d_bank = bank_to - bank_from;

        let ticks_from = self.ticks;
        let d_ticks = tps * dt;
        let steps = (d_ticks + 0.5) as i32;

        let origin = self.origin.unwrap_or(to.atime);
        let start = self.aux.start_second;
        let end = self.aux.total_seconds.map(|t| start + t);

        trace!(
            "{:.3}s to {:.3}, {} steps from tick {}",
            dt,
            to.atime,
            steps,
            ticks_from
        );

        let mut opened = false;
        for i in 0..steps {
            // a gap in the track can be hours of frames
            self.progress.update(self.fraction)?;

            let frac = f64::from(i + 1) / f64::from(steps);
            let atime = time_from + frac * dt;

            let elapsed = atime - origin;
            if elapsed < start {
                continue;
            }
            if end.map_or(false, |e| elapsed >= e) {
                break;
            }

            let mut altitude = alt_from + frac * d_alt;
            let mut pitch = pitch_from + frac * d_pitch;
            let mut bank = bank_from + frac * d_bank;
            let airspeed = as_from + frac * d_as;

            self.ticks = ticks_from + (frac * d_ticks + 0.5) as u32;

            let on_ground = match self.aux.minimum_altitude {
                Some(min) if altitude <= min => {
                    altitude = min;
                    pitch = 0_f64;
                    bank = 0_f64;
                    true
                }
                _ => false,
            };

            if !self.ground_state_sent {
                self.ground_state_sent = true;
                self.sent.set(SimOnGround, Value::Bool(!on_ground));
            }

            self.values.set(AbsoluteTime, Value::Double(atime));
            self.values.set(PlaneLatitude, Value::Double(lat_from + frac * d_lat));
            self.values.set(PlaneLongitude, Value::Double(lon_from + frac * d_lon));
            self.values.set(SimOnGround, Value::Bool(on_ground));
            self.values.set(PlaneAltitude, Value::Double(altitude));
            self.values.set(IndicatedAltitude, Value::Double(altitude));
            self.values.set(PlaneBankDegrees, Value::Double(bank));
            self.values.set(PlanePitchDegrees, Value::Double(pitch));

            // GPS noise swings the course around while parked
            if !self.aux.jitter_reduction || airspeed > JITTER_AIRSPEED {
                self.values.set(AirspeedIndicated, Value::Double(airspeed));
                self.values.set(
                    PlaneHeadingDegreesTrue,
                    Value::Double(hdg_range_guard(hdg_from + frac * d_hdg)),
                );
                if let Some((from, d)) = magnetic {
                    self.values.set(
                        PlaneHeadingDegreesMagnetic,
                        Value::Double(hdg_range_guard(from + frac * d)),
                    );
                }
            }

            if !opened {
                opened = true;
                self.next_record()?;
            }

            self.write_frame(atime)?;
        }

        Ok(())
    }

    /// Write one frame holding every property that differs from what was
    /// last sent
    fn write_frame(&mut self, atime: f64) -> Result<()> {
        let frib = self.sink.frib_start()?;
        self.sink
            .ts_item(self.frame_no, self.ticks, (atime * 256_f64) as i64)?;
        self.frame_no += 1;

        let dict = self.dict;
        for (pid, detail) in dict.defined() {
            let slot = pid as usize;
            let v = match self.values.slot(slot) {
                Some(v) => v,
                None => continue,
            };

            let forced = self.aux.always_send_position && POSITION.iter().any(|p| p.id() == pid);
            if !forced && self.sent.slot(slot) == Some(v) {
                continue;
            }

            self.sink.fr_item(detail.object.id(), pid, v)?;
            self.sent.set_slot(slot, v.clone());
        }

        self.sink.frib_end(frib)
    }
}

impl<'a, 'p> Handle for Engine<'a, 'p> {
    fn report_progress(&mut self, fraction: f64) -> Result<()> {
        self.fraction = fraction;
        self.progress.update(fraction)
    }
}

impl<'a, 'p> Pushable<TrackSample> for Engine<'a, 'p> {
    fn push_data(&mut self, s: TrackSample) -> Result<()> {
        let mut atime = absolute_time(&s.time);

        if let Some(forced) = self.forced_start {
            let first = *self.track_start.get_or_insert(atime);
            atime = atime - first + forced;
        }

        let to = Target::new(&s, atime, self.target.as_ref());
        self.target = Some(to);

        match (to.heading_true, to.airspeed) {
            (Some(heading), Some(airspeed)) => self.flush(to, heading, airspeed),
            _ => {
                trace!("no course or speed known at {:.3}, no frames", atime);
                Ok(())
            }
        }
    }
}

fn write_definitions(sink: &mut dyn ChunkSink, dict: &PropertyDictionary) -> Result<()> {
    let odib = sink.odib_start()?;
    for o in ObjectId::ALL.iter() {
        sink.ob_item(o.id(), o.name())?;
    }
    sink.odib_end(odib)?;

    let pdib = sink.pdib_start()?;
    for (pid, d) in dict.defined() {
        if let Some(t) = d.value_type {
            sink.pr_item(d.object.id(), pid, t.id(), d.unit, d.name)?;
        }
    }
    sink.pdib_end(pdib)
}

/// Convert the track read by `producer` from `input` into a complete
/// container on `sink`
pub fn convert(
    producer: &mut dyn DatumProducer,
    input: &mut dyn ProgressRead,
    sink: &mut dyn ChunkSink,
    aux: &AuxiliaryData,
    progress: &mut Progress,
) -> Result<()> {
    aux.validate()?;
    let dict = PropertyDictionary::fs2002();

    let file = sink.start()?;
    let fsib = sink.fsib_start()?;
    let bfib = sink.bfib_start()?;
    write_definitions(sink, &dict)?;

    let (bfib, frames) = {
        let mut engine = Engine::new(&mut *sink, &mut *progress, aux, bfib);
        producer.parse(input, &mut engine)?;
        engine.finish()
    };

    if let Some(bfib) = bfib {
        sink.bfib_end(bfib)?;
    }

    let trailer = sink.trailer_start()?;
    sink.da_item(DataItemId::Name.id(), &aux.name)?;
    sink.da_item(DataItemId::Description.id(), &aux.description)?;
    sink.trailer_end(trailer)?;

    sink.fsib_end(fsib)?;
    sink.end(file)?;

    info!("wrote {} frames", frames);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk::binary::BinaryWriter;
    use chunk::binary_reader::BinaryReader;
    use chunk::recorder::{Event, Frame, Recorder};
    use chunk::ChunkSource;
    use datum::nmea::tests::{RMC, RMC_2};
    use datum::nmea::NmeaReader;
    use error::Error;
    use progress::{TrackedReader, LARGE_INTERVAL};
    use std::io::Cursor;

    struct Samples(Vec<TrackSample>);

    impl DatumProducer for Samples {
        fn parse(&mut self, _input: &mut dyn ProgressRead, h: &mut dyn Pushable<TrackSample>) -> Result<()> {
            for s in self.0.drain(..) {
                h.push_data(s)?;
            }
            Ok(())
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    /// Sample `ms` milliseconds into the track, 100 kt on course 090 at 1000 ft
    fn at(ms: i64, lat: f64) -> TrackSample {
        let mut s = TrackSample::new(base() + ::chrono::Duration::milliseconds(ms), lat, -74_f64);
        s.altitude = Some(1000_f64);
        s.ground_speed = Some(100_f64);
        s.true_course = Some(90_f64);
        s
    }

    fn run(samples: Vec<TrackSample>, aux: &AuxiliaryData) -> Recorder {
        let mut rec = Recorder::new();
        let mut input = TrackedReader::new(&b""[..], None);
        convert(
            &mut Samples(samples),
            &mut input,
            &mut rec,
            aux,
            &mut Progress::none(),
        )
        .unwrap();
        rec
    }

    fn run_nmea(data: &[u8], aux: &AuxiliaryData, sink: &mut dyn ChunkSink) -> Result<()> {
        let mut input = TrackedReader::new(data, Some(data.len() as u64));
        convert(
            &mut NmeaReader::new(),
            &mut input,
            sink,
            aux,
            &mut Progress::none(),
        )
    }

    fn nmea_track() -> Vec<u8> {
        let mut v = RMC.to_vec();
        v.extend_from_slice(RMC_2);
        v
    }

    fn get(f: &Frame, id: PropertyId) -> Option<f64> {
        f.f64(id.id())
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Absolute times are around 6e10 s, a few microseconds apart is the same time
    fn same_time(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_absolute_time() {
        assert_eq!(absolute_time(&Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()), EPOCH_OFFSET);
        assert_eq!(
            absolute_time(&(base() + ::chrono::Duration::milliseconds(250))),
            1_577_880_000_f64 + EPOCH_OFFSET + 0.25
        );
    }

    #[test]
    fn test_container_layout() {
        let aux = AuxiliaryData {
            name: "flight".to_string(),
            description: "test".to_string(),
            ..Default::default()
        };
        let rec = run(vec![], &aux);

        assert_eq!(
            rec.events[..8].to_vec(),
            vec![
                Event::Start,
                Event::FsibStart,
                Event::BfibStart,
                Event::OdibStart,
                Event::Ob(4096, "UserAircraft".to_string()),
                Event::Ob(8192, "Enviroment".to_string()),
                Event::OdibEnd,
                Event::PdibStart,
            ]
        );
        assert_eq!(
            rec.events[rec.events.len() - 8..].to_vec(),
            vec![
                Event::PdibEnd,
                Event::BfibEnd,
                Event::TrailerStart,
                Event::Da(1, "flight".to_string()),
                Event::Da(2, "test".to_string()),
                Event::TrailerEnd,
                Event::FsibEnd,
                Event::End,
            ]
        );

        let defs: Vec<&Event> = rec
            .events
            .iter()
            .filter(|e| match **e {
                Event::Pr(..) => true,
                _ => false,
            })
            .collect();
        assert_eq!(defs.len(), 41);
        assert_eq!(
            *defs[0],
            Event::Pr(4096, 1, 2, "degrees".to_string(), "PLANE LATITUDE".to_string())
        );
        assert_eq!(
            *defs[39],
            Event::Pr(8192, 40, 2, "second".to_string(), "ABSOLUTE TIME".to_string())
        );

        assert!(rec.frames().is_empty());
    }

    #[test]
    fn test_first_frame() {
        let mut s = at(0, 40_f64);
        s.mag_variation = Some(-10_f64);
        let rec = run(vec![s], &AuxiliaryData::default());

        let frames = rec.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(rec.count(&Event::BfibStart), 2);

        let f = &frames[0];
        assert_eq!(f.frame_no, 0);
        assert_eq!(f.ticks, 1);
        let expected = (absolute_time(&base()) * 256_f64) as i64;
        assert!((f.timeval - expected).abs() <= 1);

        assert_eq!(get(f, PlaneLatitude), Some(40_f64));
        assert_eq!(get(f, PlaneLongitude), Some(-74_f64));
        assert_eq!(get(f, PlaneAltitude), Some(1000_f64));
        assert_eq!(get(f, IndicatedAltitude), Some(1000_f64));
        assert_eq!(get(f, PlaneHeadingDegreesTrue), Some(90_f64));
        assert_eq!(get(f, PlaneHeadingDegreesMagnetic), Some(100_f64));
        assert_eq!(get(f, AirspeedIndicated), Some(100_f64));
        assert_eq!(get(f, GForce), Some(1_f64));
        assert_eq!(f.value(SimOnGround.id()), Some(&Value::Bool(false)));
        assert!(same_time(get(f, AbsoluteTime).unwrap(), absolute_time(&base())));
        // level flight on a steady course
        assert_eq!(get(f, PlanePitchDegrees), None);
        assert_eq!(get(f, PlaneBankDegrees), None);
        assert_eq!(get(f, TimeZoneOffset), None);
    }

    #[test]
    fn test_nmea_interpolation() {
        let mut rec = Recorder::new();
        run_nmea(&nmea_track(), &AuxiliaryData::default(), &mut rec).unwrap();

        let frames = rec.frames();
        assert_eq!(frames.len(), 19);
        assert_eq!(rec.count(&Event::BfibStart), 3);
        assert_eq!(rec.count(&Event::BfibEnd), 3);

        for (i, f) in frames.iter().enumerate() {
            assert_eq!(f.frame_no, i as u32);
            assert_eq!(f.ticks, i as u32 + 1);
            // position goes out in every frame
            assert!(get(f, PlaneLatitude).is_some());
            assert!(get(f, PlaneLongitude).is_some());
            assert!(get(f, PlaneAltitude).is_some());
        }

        assert!(close(get(&frames[1], PlaneLatitude).unwrap(), 40_f64 + 0.001 / 18_f64));
        assert!(close(get(&frames[18], PlaneLatitude).unwrap(), 40.001));
        assert_eq!(get(&frames[18], PlaneLongitude), Some(-74_f64));

        let lats: Vec<f64> = frames.iter().map(|f| get(f, PlaneLatitude).unwrap()).collect();
        assert!(lats.windows(2).all(|w| w[1] > w[0]));

        // one second of track in 1/256 s units
        let span = frames[18].timeval - frames[0].timeval;
        assert!((span - 256).abs() <= 1);

        // heading and speed do not change after the first frame
        assert_eq!(get(&frames[0], PlaneHeadingDegreesTrue), Some(90_f64));
        assert!(frames[1..].iter().all(|f| get(f, PlaneHeadingDegreesTrue).is_none()));
        assert!(frames[1..].iter().all(|f| get(f, AirspeedIndicated).is_none()));
    }

    #[test]
    fn test_heading_wrap_and_bank() {
        let mut a = at(0, 40_f64);
        a.true_course = Some(350_f64);
        let mut b = at(1000, 40_f64);
        b.true_course = Some(10_f64);

        let frames = run(vec![a, b], &AuxiliaryData::default()).frames();
        assert_eq!(frames.len(), 19);

        let headings: Vec<f64> = frames[1..]
            .iter()
            .map(|f| get(f, PlaneHeadingDegreesTrue).unwrap())
            .collect();
        assert!(close(headings[0], 350_f64 + 20_f64 / 18_f64));
        assert!(close(headings[17], 10_f64));
        assert!(headings.iter().all(|&h| h >= 0_f64 && h <= 360_f64));
        // turned right through north, never back through south
        assert!(headings.iter().all(|&h| h > 350_f64 || h <= 10_f64 + 1e-9));

        // 20 degrees per second at 100 kt is past the bank limit
        let banks: Vec<f64> = frames[1..]
            .iter()
            .map(|f| get(f, PlaneBankDegrees).unwrap())
            .collect();
        assert!(banks.iter().all(|&b| b < 0_f64 && b >= -MAX_BANK));
        assert!(close(banks[17], -60_f64));
    }

    #[test]
    fn test_pitch_limits() {
        let mut climb = at(1000, 40_f64);
        climb.altitude = Some(1110_f64);
        let mut descent = at(2000, 40_f64);
        descent.altitude = Some(1000_f64);

        let frames = run(vec![at(0, 40_f64), climb, descent], &AuxiliaryData::default()).frames();
        assert_eq!(frames.len(), 37);

        assert!(close(get(&frames[18], PlanePitchDegrees).unwrap(), -15_f64));
        assert!(close(get(&frames[36], PlanePitchDegrees).unwrap(), 7_f64));
        assert!(close(get(&frames[18], PlaneAltitude).unwrap(), 1110_f64));
        assert!(close(get(&frames[36], PlaneAltitude).unwrap(), 1000_f64));
    }

    #[test]
    fn test_ground_clamp() {
        let aux = AuxiliaryData {
            minimum_altitude: Some(500_f64),
            ..Default::default()
        };
        let mut a = at(0, 40_f64);
        a.altitude = Some(400_f64);
        let mut b = at(1000, 40_f64);
        b.altitude = Some(600_f64);

        let frames = run(vec![a, b], &aux).frames();
        assert_eq!(frames.len(), 19);

        assert_eq!(frames[0].value(SimOnGround.id()), Some(&Value::Bool(true)));
        assert_eq!(get(&frames[0], PlaneAltitude), Some(500_f64));
        assert_eq!(get(&frames[0], IndicatedAltitude), Some(500_f64));

        // lifted off right away, the state change is sent once
        assert_eq!(frames[1].value(SimOnGround.id()), Some(&Value::Bool(false)));
        assert!(frames[2..].iter().all(|f| f.value(SimOnGround.id()).is_none()));
        assert!(frames[1..].iter().all(|f| get(f, PlaneAltitude).unwrap() > 500_f64));
        assert!(close(get(&frames[18], PlaneAltitude).unwrap(), 600_f64));
    }

    #[test]
    fn test_jitter_reduction() {
        let parked = |ms, course| {
            let mut s = at(ms, 40_f64);
            s.ground_speed = Some(0.5);
            s.true_course = Some(course);
            s
        };

        let frames = run(vec![parked(0, 90_f64), parked(1000, 180_f64)], &AuxiliaryData::default()).frames();
        assert_eq!(frames.len(), 19);
        assert!(frames.iter().all(|f| get(f, PlaneHeadingDegreesTrue).is_none()));
        assert!(frames.iter().all(|f| get(f, AirspeedIndicated).is_none()));

        let aux = AuxiliaryData {
            jitter_reduction: false,
            ..Default::default()
        };
        let frames = run(vec![parked(0, 90_f64), parked(1000, 180_f64)], &aux).frames();
        assert_eq!(get(&frames[0], PlaneHeadingDegreesTrue), Some(90_f64));
        assert_eq!(get(&frames[0], AirspeedIndicated), Some(0.5));
        assert!(close(get(&frames[18], PlaneHeadingDegreesTrue).unwrap(), 180_f64));
    }

    #[test]
    fn test_position_only_when_changed() {
        let aux = AuxiliaryData {
            always_send_position: false,
            ..Default::default()
        };
        let frames = run(vec![at(0, 40_f64), at(1000, 40_f64)], &aux).frames();
        assert_eq!(frames.len(), 19);
        assert!(get(&frames[0], PlaneLatitude).is_some());
        assert!(frames[1..].iter().all(|f| get(f, PlaneLatitude).is_none()));
        assert!(frames[1..].iter().all(|f| get(f, PlaneAltitude).is_none()));
        // time always moves
        assert!(frames.iter().all(|f| get(f, AbsoluteTime).is_some()));
    }

    #[test]
    fn test_start_second() {
        let aux = AuxiliaryData {
            start_second: 0.5,
            ..Default::default()
        };
        let rec = run(vec![at(0, 40_f64), at(1000, 40_f64), at(2000, 40_f64)], &aux);
        let frames = rec.frames();

        assert_eq!(frames.len(), 19);
        assert_eq!(frames[0].frame_no, 0);
        assert_eq!(frames[0].ticks, 1);
        assert!(same_time(
            get(&frames[0], AbsoluteTime).unwrap(),
            absolute_time(&base()) + 1_f64
        ));
        assert_eq!(frames[18].ticks, 19);
        // nothing was written for the skipped sample
        assert_eq!(rec.count(&Event::BfibStart), 3);
    }

    #[test]
    fn test_total_seconds() {
        let aux = AuxiliaryData {
            total_seconds: Some(1.52),
            ..Default::default()
        };
        let frames = run(vec![at(0, 40_f64), at(1000, 40_f64), at(2000, 40_f64)], &aux).frames();

        assert_eq!(frames.len(), 1 + 18 + 9);
        let last = get(&frames[27], AbsoluteTime).unwrap();
        assert!(same_time(last, absolute_time(&base()) + 1.5));
    }

    #[test]
    fn test_forced_start_time() {
        let start = Utc.with_ymd_and_hms(2004, 1, 22, 17, 30, 0).unwrap();
        let aux = AuxiliaryData {
            start_time: Some(start),
            ..Default::default()
        };
        let frames = run(vec![at(0, 40_f64), at(1000, 40_f64)], &aux).frames();

        let first = get(&frames[0], AbsoluteTime).unwrap();
        let last = get(&frames[18], AbsoluteTime).unwrap();
        assert!(same_time(first, absolute_time(&start)));
        assert!(same_time(last, absolute_time(&start) + 1_f64));
        assert!((frames[0].timeval as f64 / 256_f64 - absolute_time(&start)).abs() < 0.01);
    }

    #[test]
    fn test_ticks_monotonic() {
        let samples = vec![
            at(0, 40_f64),
            at(500, 40.0001),
            at(2300, 40.0002),
            at(2300, 40.0003),
            at(2200, 40.0004),
            at(4000, 40.0005),
        ];
        let frames = run(samples, &AuxiliaryData::default()).frames();

        assert_eq!(frames.len(), 1 + 9 + 32 + 31);
        assert!(frames.windows(2).all(|w| w[1].ticks > w[0].ticks));
        assert!(frames.windows(2).all(|w| w[1].timeval >= w[0].timeval));
        assert!(frames.windows(2).all(|w| w[1].frame_no == w[0].frame_no + 1));
    }

    #[test]
    fn test_missing_fields_carried() {
        let mut b = TrackSample::new(base() + ::chrono::Duration::seconds(1), 40.001, -74_f64);
        b.true_course = None;
        b.ground_speed = None;
        b.altitude = None;

        let frames = run(vec![at(0, 40_f64), b], &AuxiliaryData::default()).frames();
        assert_eq!(frames.len(), 19);
        assert!(close(get(&frames[18], PlaneAltitude).unwrap(), 1000_f64));
        assert!(frames[1..].iter().all(|f| get(f, PlaneHeadingDegreesTrue).is_none()));
        assert!(frames[1..].iter().all(|f| get(f, PlaneBankDegrees).is_none()));
    }

    #[test]
    fn test_waits_for_speed_and_course() {
        let mut samples = vec![at(0, 40_f64), at(1000, 40.001)];
        for s in samples.iter_mut() {
            s.ground_speed = None;
            s.true_course = None;
        }

        let rec = run(samples, &AuxiliaryData::default());
        assert!(rec.frames().is_empty());
        assert_eq!(rec.count(&Event::End), 1);
    }

    #[test]
    fn test_speed_and_course_arrive_late() {
        let mut first = at(0, 40_f64);
        first.ground_speed = None;
        first.true_course = None;
        let mut second = at(1000, 40.001);
        second.ground_speed = Some(80_f64);
        second.true_course = None;
        let mut third = at(2000, 40.002);
        third.ground_speed = None;

        let frames = run(vec![first, second, third, at(3000, 40.003)], &AuxiliaryData::default()).frames();
        assert_eq!(frames.len(), 19);

        let f = &frames[0];
        assert_eq!(f.ticks, 1);
        assert_eq!(get(f, PlaneLatitude), Some(40.002));
        assert_eq!(get(f, PlaneHeadingDegreesTrue), Some(90_f64));
        assert_eq!(get(f, AirspeedIndicated), Some(80_f64));
        assert!(same_time(
            get(f, AbsoluteTime).unwrap(),
            absolute_time(&base()) + 2_f64
        ));

        assert!(close(get(&frames[18], AirspeedIndicated).unwrap(), 100_f64));
    }

    #[test]
    fn test_nmea_without_speed_and_course() {
        let mut data = b"$GPRMC,120000,A,4000.0000,N,07400.0000,W,,,010120,,*09\r\n".to_vec();
        data.extend_from_slice(RMC_2);

        let mut rec = Recorder::new();
        run_nmea(&data, &AuxiliaryData::default(), &mut rec).unwrap();

        let frames = rec.frames();
        assert_eq!(frames.len(), 1);
        assert!(close(get(&frames[0], PlaneLatitude).unwrap(), 40.001));
        assert_eq!(get(&frames[0], AirspeedIndicated), Some(100_f64));
    }

    #[test]
    fn test_cancelled_inside_gap() {
        let mut rec = Recorder::new();
        let mut input = TrackedReader::new(&b""[..], None);
        let mut calls = 0;
        let mut progress = Progress::new(::std::time::Duration::from_millis(0), move |_| {
            calls += 1;
            calls > 100
        });

        // six hours without a fix
        let r = convert(
            &mut Samples(vec![at(0, 40_f64), at(6 * 3600 * 1000, 40.5)]),
            &mut input,
            &mut rec,
            &AuxiliaryData::default(),
            &mut progress,
        );
        match r {
            Err(Error::Cancelled) => {}
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(rec.frames().len(), 100);
        assert_eq!(rec.count(&Event::End), 0);
    }

    #[test]
    fn test_cancelled() {
        let mut rec = Recorder::new();
        let data = nmea_track();
        let mut input = TrackedReader::new(&data[..], Some(data.len() as u64));
        let mut progress = Progress::new(LARGE_INTERVAL, |_| true);

        let r = convert(
            &mut NmeaReader::new(),
            &mut input,
            &mut rec,
            &AuxiliaryData::default(),
            &mut progress,
        );
        match r {
            Err(Error::Cancelled) => {}
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(rec.count(&Event::End), 0);
    }

    #[test]
    fn test_bad_rate_rejected() {
        let aux = AuxiliaryData {
            ticks_per_second: 0_f64,
            ..Default::default()
        };
        let mut rec = Recorder::new();
        assert!(run_nmea(&nmea_track(), &aux, &mut rec).is_err());
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_binary_round_trip() {
        let aux = AuxiliaryData {
            name: "round trip".to_string(),
            ..Default::default()
        };
        let mut direct = Recorder::new();
        run_nmea(&nmea_track(), &aux, &mut direct).unwrap();

        let mut w = BinaryWriter::new(Cursor::new(vec![])).unwrap();
        run_nmea(&nmea_track(), &aux, &mut w).unwrap();
        let data = w.into_output().into_inner().into_inner();

        let mut replayed = Recorder::new();
        BinaryReader::new(&data[..], Some(data.len() as u64))
            .replay(&mut replayed, &mut Progress::none())
            .unwrap();

        assert_eq!(replayed.events, direct.events);
    }
}
