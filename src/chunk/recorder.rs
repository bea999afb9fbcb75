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

//! Sink that remembers every call, for tests.

use super::*;

#[derive(PartialEq, Debug, Clone)]
pub enum Event {
    Start,
    End,
    FsibStart,
    FsibEnd,
    BfibStart,
    BfibEnd,
    OdibStart,
    Ob(u16, String),
    OdibEnd,
    PdibStart,
    Pr(u16, u16, u16, String, String),
    PdibEnd,
    FribStart,
    Ts(u32, u32, i64),
    Fr(u16, u16, Value),
    FribEnd,
    TrailerStart,
    Da(u16, String),
    TrailerEnd,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Frame {
    pub frame_no: u32,
    pub ticks: u32,
    pub timeval: i64,
    pub values: Vec<(u16, Value)>,
}

impl Frame {
    pub fn value(&self, pid: u16) -> Option<&Value> {
        self.values.iter().find(|&&(p, _)| p == pid).map(|&(_, ref v)| v)
    }

    pub fn f64(&self, pid: u16) -> Option<f64> {
        self.value(pid).and_then(|v| v.as_f64())
    }
}

pub struct Recorder {
    pub events: Vec<Event>,
    stack: ChunkStack<()>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder {
            events: vec![],
            stack: ChunkStack::new(),
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = vec![];

        for e in self.events.iter() {
            match *e {
                Event::Ts(frame_no, ticks, timeval) => frames.push(Frame {
                    frame_no,
                    ticks,
                    timeval,
                    values: vec![],
                }),
                Event::Fr(_, pid, ref v) => {
                    if let Some(f) = frames.last_mut() {
                        f.values.push((pid, v.clone()));
                    }
                }
                _ => {}
            }
        }

        frames
    }

    pub fn count(&self, e: &Event) -> usize {
        self.events.iter().filter(|x| *x == e).count()
    }

    fn open(&mut self, kind: ChunkKind, e: Event) -> Result<Chunk> {
        let c = self.stack.push(kind, ());
        self.events.push(e);
        Ok(c)
    }

    fn close(&mut self, c: Chunk, kind: ChunkKind, e: Event) -> Result<()> {
        self.stack.pop(c, kind);
        self.events.push(e);
        Ok(())
    }

    fn item(&mut self, kind: ChunkKind, e: Event) -> Result<()> {
        self.stack.expect_top(kind);
        self.events.push(e);
        Ok(())
    }
}

impl ChunkSink for Recorder {
    fn start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::File, Event::Start)
    }

    fn end(&mut self, file: Chunk) -> Result<()> {
        self.close(file, ChunkKind::File, Event::End)
    }

    fn fsib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Fsib, Event::FsibStart)
    }

    fn fsib_end(&mut self, fsib: Chunk) -> Result<()> {
        self.close(fsib, ChunkKind::Fsib, Event::FsibEnd)
    }

    fn bfib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Bfib, Event::BfibStart)
    }

    fn bfib_end(&mut self, bfib: Chunk) -> Result<()> {
        self.close(bfib, ChunkKind::Bfib, Event::BfibEnd)
    }

    fn odib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Odib, Event::OdibStart)
    }

    fn ob_item(&mut self, oid: u16, name: &str) -> Result<()> {
        self.item(ChunkKind::Odib, Event::Ob(oid, name.to_string()))
    }

    fn odib_end(&mut self, odib: Chunk) -> Result<()> {
        self.close(odib, ChunkKind::Odib, Event::OdibEnd)
    }

    fn pdib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Pdib, Event::PdibStart)
    }

    fn pr_item(&mut self, oid: u16, pid: u16, tid: u16, unit: &str, name: &str) -> Result<()> {
        self.item(
            ChunkKind::Pdib,
            Event::Pr(oid, pid, tid, unit.to_string(), name.to_string()),
        )
    }

    fn pdib_end(&mut self, pdib: Chunk) -> Result<()> {
        self.close(pdib, ChunkKind::Pdib, Event::PdibEnd)
    }

    fn frib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Frib, Event::FribStart)
    }

    fn ts_item(&mut self, frame_no: u32, ticks: u32, timeval: i64) -> Result<()> {
        self.item(ChunkKind::Frib, Event::Ts(frame_no, ticks, timeval))
    }

    fn fr_item(&mut self, oid: u16, pid: u16, value: &Value) -> Result<()> {
        self.item(ChunkKind::Frib, Event::Fr(oid, pid, value.clone()))
    }

    fn frib_end(&mut self, frib: Chunk) -> Result<()> {
        self.close(frib, ChunkKind::Frib, Event::FribEnd)
    }

    fn trailer_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Trailer, Event::TrailerStart)
    }

    fn da_item(&mut self, id: u16, data: &str) -> Result<()> {
        self.item(ChunkKind::Trailer, Event::Da(id, data.to_string()))
    }

    fn trailer_end(&mut self, trailer: Chunk) -> Result<()> {
        self.close(trailer, ChunkKind::Trailer, Event::TrailerEnd)
    }
}
