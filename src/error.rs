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

use quick_xml::events::attributes::AttrError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] AttrError),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Malformed container or track file, aborts the conversion
    #[error("invalid file format: {0}")]
    InvalidFile(String),
    #[error("unknown property type: {0}")]
    UnknownPropertyType(u16),
    #[error("operation aborted")]
    Cancelled,
    #[error("conversion from {from} to {to} is not supported")]
    Unsupported { from: String, to: String },
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("output file already exists: {}", .0.display())]
    OutputExists(PathBuf),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFile(msg.into())
    }

    /// Running out of input inside a structure means the file is malformed
    pub(crate) fn truncated(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::invalid("unexpected end of file")
        } else {
            Error::Io(e)
        }
    }

    /// Errors that are part of normal operation and only need their message shown
    pub fn is_expected(&self) -> bool {
        match *self {
            Error::Io(_) | Error::Xml(_) | Error::XmlAttribute(_) => false,
            _ => true,
        }
    }
}
