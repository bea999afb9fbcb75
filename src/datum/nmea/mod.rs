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

use super::{DatumProducer, TrackSample};
use error::Result;
use handle::Pushable;
use progress::ProgressRead;
use std::io;
use std::result;
use std::str;

pub mod sentence;

use self::sentence::{Gga, GgaHandler, Rmc, RmcHandler};

/// Longest sentence allowed, including `$` and CR LF
const MAX_SENTENCE: usize = 82;
const READ_BLOCK: usize = 4096;

#[derive(PartialEq, Debug, Copy, Clone)]
enum State {
    Start,
    Command,
    Data,
    Checksum,
    End,
}

#[derive(PartialEq, Debug, Clone)]
pub enum NmeaData {
    Rmc(Rmc),
    Gga(Gga),
}

/// Decodes the comma separated fields of one sentence type
pub trait SentenceHandler {
    /// Command id this handler is registered for, e.g. `GPRMC`
    fn command(&self) -> &str;
    /// `Ok(None)` when the sentence is well formed but carries no usable fix
    fn handle(&mut self, fields: &[&str]) -> result::Result<Option<NmeaData>, String>;
}

pub trait NmeaListener {
    fn on_data(&mut self, d: NmeaData) -> Result<()>;

    fn on_error(&mut self, msg: &str) {
        warn!("NMEA parser error: {}", msg);
    }

    fn on_discard(&mut self, junk: &[u8]) {
        debug!("discarding '{}'", String::from_utf8_lossy(junk).escape_debug());
    }
}

pub struct NmeaParser {
    state: State,
    buffer: Vec<u8>,
    checksum: u8,
    checksummed: bool,
    command: String,
    data: String,
    handlers: Vec<Box<dyn SentenceHandler>>,
}

impl NmeaParser {
    pub fn new() -> Self {
        NmeaParser {
            state: State::Start,
            buffer: Vec::with_capacity(MAX_SENTENCE),
            checksum: 0,
            checksummed: false,
            command: String::new(),
            data: String::new(),
            handlers: vec![],
        }
    }

    /// Sentences go to the first registered handler with a matching command
    pub fn register(&mut self, h: Box<dyn SentenceHandler>) {
        self.handlers.push(h);
    }

    pub fn reset(&mut self) {
        self.state = State::Start;
        self.buffer.clear();
    }

    pub fn feed(&mut self, bytes: &[u8], l: &mut dyn NmeaListener) -> Result<()> {
        for &c in bytes {
            self.byte(c, l)?;
        }

        Ok(())
    }

    fn begin(&mut self) {
        self.buffer.clear();
        self.checksum = 0;
        self.checksummed = false;
        self.state = State::Command;
    }

    fn fail(&mut self, msg: &str, l: &mut dyn NmeaListener) {
        l.on_error(&format!(
            "{}: {}",
            msg,
            String::from_utf8_lossy(&self.buffer).escape_debug()
        ));
        if !self.buffer.is_empty() {
            l.on_discard(&self.buffer);
        }

        self.buffer.clear();
        self.state = State::Start;
    }

    fn byte(&mut self, c: u8, l: &mut dyn NmeaListener) -> Result<()> {
        if self.buffer.len() == MAX_SENTENCE {
            if self.state == State::Start {
                l.on_discard(&self.buffer);
                self.buffer.clear();
            } else {
                self.fail("buffer overflow", l);
            }
        }
        self.buffer.push(c);

        let err = match self.state {
            State::Start => {
                if c == b'$' {
                    let n = self.buffer.len();
                    if n > 1 {
                        l.on_discard(&self.buffer[..n - 1]);
                    }
                    self.begin();
                }
                None
            }
            State::Command => self.command_byte(c),
            State::Data => {
                self.data_byte(c);
                None
            }
            State::Checksum => self.checksum_byte(c),
            State::End => {
                if c == b'\n' {
                    self.buffer.clear();
                    self.state = State::Start;
                    self.dispatch(l)?;
                    None
                } else {
                    Some("missing linefeed".to_string())
                }
            }
        };

        if let Some(msg) = err {
            self.fail(&msg, l);
            // a new sentence starting here keeps us in sync
            if c == b'$' {
                self.begin();
            }
        }

        Ok(())
    }

    /// Text accumulated so far, without the delimiter just pushed
    fn field(&self) -> String {
        let n = self.buffer.len() - 1;
        String::from_utf8_lossy(&self.buffer[..n]).into_owned()
    }

    fn command_byte(&mut self, c: u8) -> Option<String> {
        // the checksum covers the bytes between '$' and '*', even when no
        // data field follows the address
        if c != b'*' {
            self.checksum ^= c;
        }

        if c != b',' && c != b'*' {
            return None;
        }

        let n = self.buffer.len();
        if n < 2 || n > 10 {
            return Some("corrupt address".to_string());
        }

        self.command = self.field();
        self.data.clear();
        self.buffer.clear();
        self.state = if c == b'*' {
            State::Checksum
        } else {
            State::Data
        };

        None
    }

    fn data_byte(&mut self, c: u8) {
        if c != b'*' && c != b'\r' {
            self.checksum ^= c;
            return;
        }

        self.data = self.field();
        self.buffer.clear();
        self.state = if c == b'*' {
            State::Checksum
        } else {
            State::End
        };
    }

    fn checksum_byte(&mut self, c: u8) -> Option<String> {
        if self.buffer.len() < 3 {
            return None;
        }

        if c != b'\r' {
            return Some(format!("corrupt checksum: 0x{:X}", c));
        }

        let published = str::from_utf8(&self.buffer[..2])
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok());

        match published {
            None => Some("corrupt checksum".to_string()),
            Some(p) if p != self.checksum => Some(format!(
                "invalid checksum: 0x{:X} (published) != 0x{:X} (calculated)",
                p, self.checksum
            )),
            Some(_) => {
                self.checksummed = true;
                self.state = State::End;
                None
            }
        }
    }

    fn dispatch(&mut self, l: &mut dyn NmeaListener) -> Result<()> {
        trace!(
            "sentence {} ({})",
            self.command,
            if self.checksummed {
                "checksummed"
            } else {
                "no checksum"
            }
        );

        let command = &self.command;
        let data = &self.data;

        match self.handlers.iter_mut().find(|h| h.command() == command.as_str()) {
            Some(h) => {
                let fields: Vec<&str> = data.split(',').collect();
                match h.handle(&fields) {
                    Ok(Some(d)) => l.on_data(d)?,
                    Ok(None) => {}
                    Err(e) => l.on_error(&format!("{}, data='{}'", e, data)),
                }
            }
            None => l.on_discard(command.as_bytes()),
        }

        Ok(())
    }
}

struct SampleCollector<'a> {
    handle: &'a mut dyn Pushable<TrackSample>,
    /// Most recent fix data, its altitude goes with the following samples
    fix: Option<Gga>,
}

impl<'a> NmeaListener for SampleCollector<'a> {
    fn on_data(&mut self, d: NmeaData) -> Result<()> {
        match d {
            NmeaData::Gga(g) => {
                self.fix = Some(g);
                Ok(())
            }
            NmeaData::Rmc(r) => {
                let mut s = TrackSample::new(r.time, r.lat, r.lon);
                s.ground_speed = r.speed;
                s.true_course = r.course;
                s.mag_variation = r.variation;

                if let Some(ref g) = self.fix {
                    s.altitude = Some(g.altitude);
                    s.fix = g.quality;
                    s.num_sv = g.num_sv;
                    s.hdop = g.hdop;
                }

                self.handle.push_data(s)
            }
        }
    }
}

/// Track samples from an NMEA 0183 stream, using RMC for position, time,
/// speed and course, and GGA for altitude
pub struct NmeaReader {
    parser: NmeaParser,
}

impl NmeaReader {
    pub fn new() -> Self {
        let mut parser = NmeaParser::new();
        parser.register(Box::new(RmcHandler));
        parser.register(Box::new(GgaHandler));

        NmeaReader { parser }
    }
}

impl Default for NmeaReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatumProducer for NmeaReader {
    fn parse(&mut self, input: &mut dyn ProgressRead, h: &mut dyn Pushable<TrackSample>) -> Result<()> {
        let mut collector = SampleCollector {
            handle: h,
            fix: None,
        };
        let mut buf = [0_u8; READ_BLOCK];

        self.parser.reset();
        loop {
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            self.parser.feed(&buf[..n], &mut collector)?;
            collector.handle.report_progress(input.fraction_read())?;
        }

        Ok(())
    }
}
