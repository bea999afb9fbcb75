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

//! Rate limited progress reporting and cooperative cancellation.

use error::{Error, Result};
use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Update interval used for long running conversions
pub const LARGE_INTERVAL: Duration = Duration::from_millis(1000);
/// Update interval used for conversions that finish quickly
pub const SMALL_INTERVAL: Duration = Duration::from_millis(100);

/// Wraps the caller's progress callback. The callback receives the fraction
/// of the input consumed and returns `true` to abort the operation.
pub struct Progress<'a> {
    callback: Option<Box<dyn FnMut(f64) -> bool + 'a>>,
    interval: Duration,
    last: Option<Instant>,
}

impl<'a> Progress<'a> {
    pub fn new<F>(interval: Duration, callback: F) -> Self
    where
        F: FnMut(f64) -> bool + 'a,
    {
        Progress {
            callback: Some(Box::new(callback)),
            interval,
            last: None,
        }
    }

    /// Progress that is never reported and never cancels
    pub fn none() -> Self {
        Progress {
            callback: None,
            interval: LARGE_INTERVAL,
            last: None,
        }
    }

    pub fn update(&mut self, fraction: f64) -> Result<()> {
        let callback = match self.callback {
            Some(ref mut cb) => cb,
            None => return Ok(()),
        };

        let now = Instant::now();
        if let Some(last) = self.last {
            if now.duration_since(last) < self.interval {
                return Ok(());
            }
        }
        self.last = Some(now);

        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.max(0.0).min(1.0)
        };

        if callback(fraction) {
            debug!("progress callback requested abort at {:.3}", fraction);
            return Err(Error::Cancelled);
        }

        Ok(())
    }
}

/// Input stream that knows how much of itself has been consumed
pub trait ProgressRead: Read {
    fn fraction_read(&self) -> f64;
}

/// Counts the bytes read from `inner`, `len` is the total input size if known
pub struct TrackedReader<R> {
    inner: R,
    read: u64,
    len: Option<u64>,
}

impl<R: Read> TrackedReader<R> {
    pub fn new(inner: R, len: Option<u64>) -> Self {
        TrackedReader {
            inner,
            read: 0,
            len,
        }
    }

    pub fn position(&self) -> u64 {
        self.read
    }
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        Ok(n)
    }
}

impl<R: Read> ProgressRead for TrackedReader<R> {
    fn fraction_read(&self) -> f64 {
        match self.len {
            Some(0) | None => 0.0,
            Some(len) => self.read as f64 / len as f64,
        }
    }
}
