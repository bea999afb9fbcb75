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

//! Real time playback: frames are held back until their tick is due.

use chunk::{Chunk, ChunkSink};
use error::{Error, Result};
use property::Value;
use std::thread;
use std::time::{Duration, Instant};

/// Lag tolerated before warning that playback cannot keep up
const LAG_WARNING: Duration = Duration::from_millis(500);

/// Chunk sink that forwards everything to `inner`, delaying every frame
/// until `ticks / ticks_per_second` seconds after the first one
pub struct PacedSink<S> {
    inner: S,
    ticks_per_second: f64,
    /// wall clock time and ticks of the first frame
    start: Option<(Instant, u32)>,
    behind: bool,
    sleep: Box<dyn FnMut(Duration)>,
}

impl<S: ChunkSink> PacedSink<S> {
    pub fn new(inner: S, ticks_per_second: f64) -> Result<Self> {
        Self::with_sleep(inner, ticks_per_second, Box::new(thread::sleep))
    }

    fn with_sleep(inner: S, ticks_per_second: f64, sleep: Box<dyn FnMut(Duration)>) -> Result<Self> {
        if !(ticks_per_second.is_finite() && ticks_per_second > 0_f64) {
            return Err(Error::InvalidConfig(format!(
                "ticks per second must be positive, got {}",
                ticks_per_second
            )));
        }

        Ok(PacedSink {
            inner,
            ticks_per_second,
            start: None,
            behind: false,
            sleep,
        })
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn wait_for(&mut self, ticks: u32) {
        let (t0, ticks0) = match self.start {
            Some(s) => s,
            None => {
                let s = (Instant::now(), ticks);
                self.start = Some(s);
                return;
            }
        };

        let due = Duration::from_secs_f64(f64::from(ticks.saturating_sub(ticks0)) / self.ticks_per_second);
        let elapsed = t0.elapsed();

        if due > elapsed {
            (self.sleep)(due - elapsed);
            self.behind = false;
        } else if elapsed - due > LAG_WARNING && !self.behind {
            warn!("playback unable to keep up, {:?} behind", elapsed - due);
            self.behind = true;
        }
    }
}

impl<S: ChunkSink> ChunkSink for PacedSink<S> {
    fn start(&mut self) -> Result<Chunk> {
        self.inner.start()
    }

    fn end(&mut self, file: Chunk) -> Result<()> {
        self.inner.end(file)
    }

    fn fsib_start(&mut self) -> Result<Chunk> {
        self.inner.fsib_start()
    }

    fn fsib_end(&mut self, fsib: Chunk) -> Result<()> {
        self.inner.fsib_end(fsib)
    }

    fn bfib_start(&mut self) -> Result<Chunk> {
        self.inner.bfib_start()
    }

    fn bfib_end(&mut self, bfib: Chunk) -> Result<()> {
        self.inner.bfib_end(bfib)
    }

    fn odib_start(&mut self) -> Result<Chunk> {
        self.inner.odib_start()
    }

    fn ob_item(&mut self, oid: u16, name: &str) -> Result<()> {
        self.inner.ob_item(oid, name)
    }

    fn odib_end(&mut self, odib: Chunk) -> Result<()> {
        self.inner.odib_end(odib)
    }

    fn pdib_start(&mut self) -> Result<Chunk> {
        self.inner.pdib_start()
    }

    fn pr_item(&mut self, oid: u16, pid: u16, tid: u16, unit: &str, name: &str) -> Result<()> {
        self.inner.pr_item(oid, pid, tid, unit, name)
    }

    fn pdib_end(&mut self, pdib: Chunk) -> Result<()> {
        self.inner.pdib_end(pdib)
    }

    fn frib_start(&mut self) -> Result<Chunk> {
        self.inner.frib_start()
    }

    fn ts_item(&mut self, frame_no: u32, ticks: u32, timeval: i64) -> Result<()> {
        self.wait_for(ticks);
        self.inner.ts_item(frame_no, ticks, timeval)
    }

    fn fr_item(&mut self, oid: u16, pid: u16, value: &Value) -> Result<()> {
        self.inner.fr_item(oid, pid, value)
    }

    fn frib_end(&mut self, frib: Chunk) -> Result<()> {
        self.inner.frib_end(frib)
    }

    fn trailer_start(&mut self) -> Result<Chunk> {
        self.inner.trailer_start()
    }

    fn da_item(&mut self, id: u16, data: &str) -> Result<()> {
        self.inner.da_item(id, data)
    }

    fn trailer_end(&mut self, trailer: Chunk) -> Result<()> {
        self.inner.trailer_end(trailer)
    }
}
