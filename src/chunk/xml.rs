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

use super::*;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

pub const DOCTYPE: &str = "FSRfile";

/// Writes the XML encoding of an FSR container
pub struct XmlWriter<W: Write> {
    writer: Writer<W>,
    stack: ChunkStack<()>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(w: W) -> Self {
        XmlWriter {
            writer: Writer::new_with_indent(w, b' ', 2),
            stack: ChunkStack::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn open(&mut self, kind: ChunkKind) -> Result<Chunk> {
        let chunk = self.stack.push(kind, ());
        self.writer
            .write_event(Event::Start(BytesStart::new(kind.element())))?;
        Ok(chunk)
    }

    fn close(&mut self, chunk: Chunk, kind: ChunkKind) -> Result<()> {
        self.stack.pop(chunk, kind);
        self.writer
            .write_event(Event::End(BytesEnd::new(kind.element())))?;
        Ok(())
    }

    /// Item element with attributes and text content. Empty content is
    /// written as a self-closing tag so no indentation ends up inside it.
    fn item(&mut self, parent: ChunkKind, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.stack.expect_top(parent);

        let mut e = BytesStart::new(name);
        for &(k, v) in attrs {
            e.push_attribute((k, v));
        }

        if text.is_empty() {
            self.writer.write_event(Event::Empty(e))?;
        } else {
            self.writer.write_event(Event::Start(e))?;
            self.writer.write_event(Event::Text(BytesText::new(text)))?;
            self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        }

        Ok(())
    }
}

impl<W: Write> ChunkSink for XmlWriter<W> {
    fn start(&mut self) -> Result<Chunk> {
        let chunk = self.stack.push(ChunkKind::File, ());
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.writer
            .write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
        Ok(chunk)
    }

    fn end(&mut self, file: Chunk) -> Result<()> {
        self.stack.pop(file, ChunkKind::File);
        let w = self.writer.get_mut();
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }

    fn fsib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Fsib)
    }

    fn fsib_end(&mut self, fsib: Chunk) -> Result<()> {
        self.close(fsib, ChunkKind::Fsib)
    }

    fn bfib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Bfib)
    }

    fn bfib_end(&mut self, bfib: Chunk) -> Result<()> {
        self.close(bfib, ChunkKind::Bfib)
    }

    fn odib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Odib)
    }

    fn ob_item(&mut self, oid: u16, name: &str) -> Result<()> {
        let oid = oid.to_string();
        self.item(ChunkKind::Odib, "ob", &[("ob", oid.as_str())], name)
    }

    fn odib_end(&mut self, odib: Chunk) -> Result<()> {
        self.close(odib, ChunkKind::Odib)
    }

    fn pdib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Pdib)
    }

    fn pr_item(&mut self, oid: u16, pid: u16, tid: u16, unit: &str, name: &str) -> Result<()> {
        let (oid, pid, tid) = (oid.to_string(), pid.to_string(), tid.to_string());
        self.item(
            ChunkKind::Pdib,
            "pr",
            &[("ob", oid.as_str()), ("pr", pid.as_str()), ("pt", tid.as_str()), ("un", unit)],
            name,
        )
    }

    fn pdib_end(&mut self, pdib: Chunk) -> Result<()> {
        self.close(pdib, ChunkKind::Pdib)
    }

    fn frib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Frib)
    }

    fn ts_item(&mut self, frame_no: u32, ticks: u32, timeval: i64) -> Result<()> {
        let (frame_no, ticks) = (frame_no.to_string(), ticks.to_string());
        self.item(
            ChunkKind::Frib,
            "ts",
            &[("fr", frame_no.as_str()), ("ti", ticks.as_str())],
            &timeval.to_string(),
        )
    }

    fn fr_item(&mut self, oid: u16, pid: u16, value: &Value) -> Result<()> {
        let (oid, pid) = (oid.to_string(), pid.to_string());
        let tid = value.value_type().id().to_string();
        self.item(
            ChunkKind::Frib,
            "fr",
            &[("ob", oid.as_str()), ("pr", pid.as_str()), ("pt", tid.as_str())],
            &value.to_string(),
        )
    }

    fn frib_end(&mut self, frib: Chunk) -> Result<()> {
        self.close(frib, ChunkKind::Frib)
    }

    fn trailer_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Trailer)
    }

    fn da_item(&mut self, id: u16, data: &str) -> Result<()> {
        let id = id.to_string();
        self.item(ChunkKind::Trailer, "da", &[("dt", id.as_str())], data)
    }

    fn trailer_end(&mut self, trailer: Chunk) -> Result<()> {
        self.close(trailer, ChunkKind::Trailer)
    }
}
