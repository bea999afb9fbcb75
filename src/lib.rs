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

//! Converts GPS track logs into flight simulator video recordings, and
//! recordings between their binary and XML encodings.

#[macro_use]
extern crate log;
extern crate byteorder;
extern crate chrono;
extern crate nom;
extern crate quick_xml;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate tempfile;
extern crate thiserror;

#[macro_use]
mod utils;
pub mod chunk;
pub mod convert;
pub mod datum;
pub mod engine;
pub mod error;
pub mod handle;
pub mod player;
pub mod progress;
pub mod property;
