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

#[macro_export]
macro_rules! m_to_ft {
    ($x:expr) => (($x as f64) * 3.280839895_f64);
}

#[macro_export]
macro_rules! mps_to_kts {
    ($x:expr) => (($x as f64) * 3600_f64 / 1852_f64);
}

/// Shortest signed turn from `from` to `to`, in (-180, 180]
pub fn hdg_difference(from: f64, to: f64) -> f64 {
    let mut d = to - from;
    if !d.is_finite() {
        return d;
    }
    while d <= -180_f64 {
        d += 360_f64;
    }
    while d > 180_f64 {
        d -= 360_f64;
    }
    d
}

/// Bring a heading back into [0, 360]
pub fn hdg_range_guard(mut h: f64) -> f64 {
    if !h.is_finite() {
        return h;
    }
    while h < 0_f64 {
        h += 360_f64;
    }
    while h > 360_f64 {
        h -= 360_f64;
    }
    h
}
