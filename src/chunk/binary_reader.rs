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

use super::binary::{FORMAT_VERSION, HEADER_SIZE, HOST_VERSION};
use super::*;
use byteorder::{LittleEndian, ReadBytesExt};
use error::Error;
use nom::bytes::complete::take;
use nom::combinator::{map, map_res};
use nom::multi::length_data;
use nom::number::complete::{le_f64, le_i32, le_i64, le_u16, le_u32};
use nom::sequence::tuple;
use nom::IResult;
use progress::{ProgressRead, TrackedReader};
use property::ValueType;
use std::io::{self, Read};
use std::str;

struct ChunkHeader {
    tag: [u8; 4],
    size: u32,
}

impl ChunkHeader {
    fn body_len(&self) -> u64 {
        self.size as u64 - HEADER_SIZE
    }

    fn name(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// Reads the binary FSR encoding and replays it onto a sink
pub struct BinaryReader<R> {
    input: TrackedReader<R>,
}

fn malformed(section: &str) -> Error {
    Error::invalid(format!("malformed {} section", section))
}

fn text(b: &[u8], what: &str) -> Result<String> {
    String::from_utf8(b.to_vec()).map_err(|_| Error::invalid(format!("{} is not valid UTF-8", what)))
}

impl<R: Read> BinaryReader<R> {
    /// `len` is the size of the input if known, used for progress reports
    pub fn new(inner: R, len: Option<u64>) -> Self {
        BinaryReader {
            input: TrackedReader::new(inner, len),
        }
    }

    fn read_header(&mut self) -> Result<ChunkHeader> {
        let mut tag = [0_u8; 4];
        self.input.read_exact(&mut tag).map_err(Error::truncated)?;
        let size = self.input.read_u32::<LittleEndian>().map_err(Error::truncated)?;

        if (size as u64) < HEADER_SIZE {
            return Err(Error::invalid(format!(
                "chunk '{}' has impossible size {}",
                String::from_utf8_lossy(&tag),
                size
            )));
        }

        Ok(ChunkHeader { tag, size })
    }

    fn read_body(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        (&mut self.input).take(len).read_to_end(&mut body)?;
        if (body.len() as u64) < len {
            return Err(Error::invalid("unexpected end of file"));
        }
        Ok(body)
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.input).take(len), &mut io::sink())?;
        if skipped < len {
            return Err(Error::invalid("unexpected end of file"));
        }
        Ok(())
    }

    fn record(&mut self, hdr: &ChunkHeader, sink: &mut dyn ChunkSink) -> Result<()> {
        if hdr.body_len() < 8 {
            return Err(Error::invalid("record chunk too short for its footer"));
        }

        let bfib = sink.bfib_start()?;
        let mut count = hdr.body_len() - 8;

        while count >= HEADER_SIZE {
            let sub = self.read_header()?;
            if sub.size as u64 > count {
                return Err(Error::invalid(format!(
                    "'{}' chunk overruns its record",
                    sub.name()
                )));
            }

            let body = self.read_body(sub.body_len())?;
            match &sub.tag {
                b"ODIB" => objects(&body, sink)?,
                b"PDIB" => properties(&body, sink)?,
                b"FRIB" => frame(&body, sink)?,
                _ => warn!("skipping unknown record section '{}'", sub.name()),
            }
            count -= sub.size as u64;
        }

        if count > 0 {
            warn!("skipping {} stray bytes at the end of a record", count);
            self.skip(count)?;
        }

        let crc = self.input.read_u32::<LittleEndian>().map_err(Error::truncated)?;
        let _size = self.input.read_u32::<LittleEndian>().map_err(Error::truncated)?;
        if crc != 0 {
            warn!("record checksum {:#010x} is not verified", crc);
        }

        sink.bfib_end(bfib)
    }

    fn trailer(&mut self, hdr: &ChunkHeader, sink: &mut dyn ChunkSink) -> Result<()> {
        // the body includes the trailer footer
        let body = self.read_body(hdr.body_len())?;
        let trailer = sink.trailer_start()?;

        let mut rest = &body[..];
        while rest.len() >= 4 + 8 {
            let (r, (id, data)) = data_item(rest).map_err(|_| malformed("trailer"))?;
            sink.da_item(id, &text(data, "trailer item")?)?;
            let pad = r.len() % 4;
            rest = &r[pad.min(r.len())..];
        }

        sink.trailer_end(trailer)
    }
}

impl<R: Read> ChunkSource for BinaryReader<R> {
    fn replay(&mut self, sink: &mut dyn ChunkSink, progress: &mut Progress) -> Result<()> {
        let mut tag = [0_u8; 4];
        self.input.read_exact(&mut tag).map_err(Error::truncated)?;
        if &tag != b"FSIB" {
            return Err(Error::invalid("not an FSR file, FSIB header missing"));
        }

        let version = self.input.read_u16::<LittleEndian>().map_err(Error::truncated)?;
        let host = self.input.read_u16::<LittleEndian>().map_err(Error::truncated)?;
        if version != FORMAT_VERSION || host != HOST_VERSION {
            return Err(Error::invalid(format!(
                "unsupported FSR version {:#06x}, host version {:#06x}",
                version, host
            )));
        }

        let file = sink.start()?;
        let fsib = sink.fsib_start()?;

        loop {
            progress.update(self.input.fraction_read())?;

            let hdr = self.read_header()?;
            match &hdr.tag {
                b"BFIB" => self.record(&hdr, sink)?,
                b"TAIB" => {
                    self.trailer(&hdr, sink)?;
                    break;
                }
                _ => {
                    warn!("skipping unknown chunk '{}'", hdr.name());
                    self.skip(hdr.body_len())?;
                }
            }
        }

        sink.fsib_end(fsib)?;
        sink.end(file)
    }
}

fn objects(body: &[u8], sink: &mut dyn ChunkSink) -> Result<()> {
    let odib = sink.odib_start()?;

    let mut rest = body;
    while rest.len() >= 4 {
        let (r, (oid, name)) = object_item(rest).map_err(|_| malformed("object definition"))?;
        sink.ob_item(oid, &text(name, "object name")?)?;
        rest = r;
    }
    if !rest.is_empty() {
        warn!("ignoring {} stray bytes after object definitions", rest.len());
    }

    sink.odib_end(odib)
}

fn properties(body: &[u8], sink: &mut dyn ChunkSink) -> Result<()> {
    let pdib = sink.pdib_start()?;

    let mut rest = body;
    while rest.len() >= 10 {
        let (r, (oid, pid, tid, name, unit)) =
            property_item(rest).map_err(|_| malformed("property definition"))?;
        sink.pr_item(
            oid,
            pid,
            tid,
            &text(unit, "property unit")?,
            &text(name, "property name")?,
        )?;
        rest = r;
    }
    if !rest.is_empty() {
        warn!("ignoring {} stray bytes after property definitions", rest.len());
    }

    sink.pdib_end(pdib)
}

fn frame(body: &[u8], sink: &mut dyn ChunkSink) -> Result<()> {
    let frib = sink.frib_start()?;

    let (mut rest, (timeval, frame_no, ticks)) =
        timestamp_item(body).map_err(|_| malformed("frame"))?;
    sink.ts_item(frame_no, ticks, timeval)?;

    // anything shorter than the smallest item is padding
    while rest.len() >= 8 {
        let (r, (oid, pid, tid)) = item_header(rest).map_err(|_| malformed("frame"))?;
        let t = ValueType::from_u16(tid).ok_or(Error::UnknownPropertyType(tid))?;
        let (r, v) = value(t, r).map_err(|_| malformed("frame"))?;
        sink.fr_item(oid, pid, &v)?;
        rest = r;
    }

    sink.frib_end(frib)
}

fn object_item(i: &[u8]) -> IResult<&[u8], (u16, &[u8])> {
    tuple((le_u16, length_data(le_u16)))(i)
}

fn property_item(i: &[u8]) -> IResult<&[u8], (u16, u16, u16, &[u8], &[u8])> {
    let (i, (oid, pid, tid, name_len, unit_len)) =
        tuple((le_u16, le_u16, le_u16, le_u16, le_u16))(i)?;
    let (i, name) = take(name_len)(i)?;
    let (i, unit) = take(unit_len)(i)?;

    Ok((i, (oid, pid, tid, name, unit)))
}

fn timestamp_item(i: &[u8]) -> IResult<&[u8], (i64, u32, u32)> {
    tuple((le_i64, le_u32, le_u32))(i)
}

fn item_header(i: &[u8]) -> IResult<&[u8], (u16, u16, u16)> {
    tuple((le_u16, le_u16, le_u16))(i)
}

fn value(t: ValueType, i: &[u8]) -> IResult<&[u8], Value> {
    match t {
        ValueType::Bool => map(le_u16, |v| Value::Bool(v != 0))(i),
        ValueType::Double => map(le_f64, Value::Double)(i),
        ValueType::Int => map(le_i32, Value::Int)(i),
        ValueType::String => map(map_res(length_data(le_u32), str::from_utf8), |s: &str| {
            Value::Str(s.to_string())
        })(i),
    }
}

fn data_item(i: &[u8]) -> IResult<&[u8], (u16, &[u8])> {
    tuple((le_u16, length_data(le_u16)))(i)
}
