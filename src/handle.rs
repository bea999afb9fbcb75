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

use error::Result;
use progress::Progress;
use std::collections::VecDeque;

pub trait Handle {
    /// Tell the handle how much of the input has been consumed (0.0 to 1.0).
    /// Returns `Error::Cancelled` once the progress callback asks to abort.
    fn report_progress(&mut self, fraction: f64) -> Result<()>;
}

pub trait Pushable<D>: Handle {
    fn push_data(&mut self, d: D) -> Result<()>;
}

/// Handle that simply queues everything pushed into it
pub struct PushableHandle<'a, 'p, D>
where
    D: 'a,
{
    progress: &'a mut Progress<'p>,
    queue: &'a mut VecDeque<D>,
}

impl<'a, 'p, D> Handle for PushableHandle<'a, 'p, D> {
    fn report_progress(&mut self, fraction: f64) -> Result<()> {
        self.progress.update(fraction)
    }
}

impl<'a, 'p, D> Pushable<D> for PushableHandle<'a, 'p, D> {
    fn push_data(&mut self, d: D) -> Result<()> {
        self.queue.push_back(d);
        Ok(())
    }
}

impl<'a, 'p, D> PushableHandle<'a, 'p, D> {
    pub fn new(progress: &'a mut Progress<'p>, queue: &'a mut VecDeque<D>) -> Self {
        Self { progress, queue }
    }
}
