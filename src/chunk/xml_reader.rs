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
use error::Error;
use progress::{ProgressRead, TrackedReader};
use property::ValueType;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use std::io::{BufReader, Read};
use std::str::{self, FromStr};

enum Node {
    /// An element and whether it has content to read
    Element(BytesStart<'static>, bool),
    Close,
    Eof,
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn eof() -> Error {
    Error::invalid("unexpected end of XML document")
}

struct Attributes {
    element: String,
    pairs: Vec<(String, String)>,
}

impl Attributes {
    fn of(e: &BytesStart) -> Result<Attributes> {
        let mut pairs = vec![];
        for a in e.attributes() {
            let a = a?;
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map_err(|e| Error::invalid(e.to_string()))?
                .into_owned();
            pairs.push((key, value));
        }

        Ok(Attributes {
            element: local_name(e),
            pairs,
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|&&(ref k, _)| k == key)
            .map(|&(_, ref v)| v.as_str())
    }

    fn require<T: FromStr>(&self, key: &str) -> Result<T> {
        let v = self.get(key).ok_or_else(|| {
            Error::invalid(format!(
                "<{}> element without '{}' attribute",
                self.element, key
            ))
        })?;

        v.trim().parse().map_err(|_| {
            Error::invalid(format!(
                "<{}> element has invalid '{}' attribute '{}'",
                self.element, key, v
            ))
        })
    }
}

/// Reads the XML encoding and replays it onto a sink
pub struct XmlReader<R: Read> {
    reader: Reader<BufReader<TrackedReader<R>>>,
}

impl<R: Read> XmlReader<R> {
    /// `len` is the size of the input if known, used for progress reports
    pub fn new(inner: R, len: Option<u64>) -> Self {
        XmlReader {
            reader: Reader::from_reader(BufReader::new(TrackedReader::new(inner, len))),
        }
    }

    fn fraction_read(&self) -> f64 {
        self.reader.get_ref().get_ref().fraction_read()
    }

    fn next_node(&mut self) -> Result<Node> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) => return Ok(Node::Element(e.into_owned(), true)),
                Event::Empty(e) => return Ok(Node::Element(e.into_owned(), false)),
                Event::End(_) => return Ok(Node::Close),
                Event::Eof => return Ok(Node::Eof),
                Event::Text(ref t) if !t.iter().all(|b| b.is_ascii_whitespace()) => {
                    warn!("ignoring stray text in XML document");
                }
                _ => {}
            }
        }
    }

    /// Text content of an item element
    fn text(&mut self, open: bool) -> Result<String> {
        let mut s = String::new();
        if !open {
            return Ok(s);
        }

        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_event_into(&mut buf)? {
                Event::Text(t) => {
                    let t = t.unescape().map_err(|e| Error::invalid(e.to_string()))?;
                    s.push_str(&t);
                }
                Event::CData(c) => {
                    s.push_str(str::from_utf8(&c).map_err(|_| Error::invalid("CDATA is not valid UTF-8"))?);
                }
                Event::Start(e) => {
                    warn!("ignoring <{}> nested in an item", local_name(&e));
                    self.skip(&e)?;
                }
                Event::End(_) => return Ok(s),
                Event::Eof => return Err(eof()),
                _ => {}
            }
        }
    }

    fn skip(&mut self, e: &BytesStart) -> Result<()> {
        let mut buf = Vec::new();
        self.reader.read_to_end_into(QName(e.name().as_ref()), &mut buf)?;
        Ok(())
    }

    fn ignore(&mut self, e: &BytesStart, open: bool, parent: &str) -> Result<()> {
        warn!("ignoring unknown element <{}> in <{}>", local_name(e), parent);
        if open {
            self.skip(e)?;
        }
        Ok(())
    }

    /// Walk the children of an element opened with `open`
    fn children<F>(&mut self, open: bool, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &BytesStart<'static>, bool) -> Result<()>,
    {
        if !open {
            return Ok(());
        }

        loop {
            match self.next_node()? {
                Node::Element(e, o) => f(self, &e, o)?,
                Node::Close => return Ok(()),
                Node::Eof => return Err(eof()),
            }
        }
    }

    fn fsib(&mut self, open: bool, sink: &mut dyn ChunkSink, progress: &mut Progress) -> Result<()> {
        let fsib = sink.fsib_start()?;

        self.children(open, |r, e, o| match local_name(e).as_str() {
            "bfib" => r.bfib(o, sink, progress),
            "trailer" => r.trailer(o, sink),
            _ => r.ignore(e, o, "fsib"),
        })?;

        sink.fsib_end(fsib)
    }

    fn bfib(&mut self, open: bool, sink: &mut dyn ChunkSink, progress: &mut Progress) -> Result<()> {
        progress.update(self.fraction_read())?;
        let bfib = sink.bfib_start()?;

        self.children(open, |r, e, o| match local_name(e).as_str() {
            "odib" => r.odib(o, sink),
            "pdib" => r.pdib(o, sink),
            "frib" => r.frib(o, sink),
            _ => r.ignore(e, o, "bfib"),
        })?;

        sink.bfib_end(bfib)
    }

    fn odib(&mut self, open: bool, sink: &mut dyn ChunkSink) -> Result<()> {
        let odib = sink.odib_start()?;

        self.children(open, |r, e, o| match local_name(e).as_str() {
            "ob" => {
                let attrs = Attributes::of(e)?;
                let oid = attrs.require("ob")?;
                let name = r.text(o)?;
                sink.ob_item(oid, &name)
            }
            _ => r.ignore(e, o, "odib"),
        })?;

        sink.odib_end(odib)
    }

    fn pdib(&mut self, open: bool, sink: &mut dyn ChunkSink) -> Result<()> {
        let pdib = sink.pdib_start()?;

        self.children(open, |r, e, o| match local_name(e).as_str() {
            "pr" => {
                let attrs = Attributes::of(e)?;
                let oid = attrs.require("ob")?;
                let pid = attrs.require("pr")?;
                let tid = attrs.require("pt")?;
                let unit = attrs.get("un").unwrap_or("").to_string();
                let name = r.text(o)?;
                sink.pr_item(oid, pid, tid, &unit, &name)
            }
            _ => r.ignore(e, o, "pdib"),
        })?;

        sink.pdib_end(pdib)
    }

    fn frib(&mut self, open: bool, sink: &mut dyn ChunkSink) -> Result<()> {
        let frib = sink.frib_start()?;

        self.children(open, |r, e, o| match local_name(e).as_str() {
            "ts" => {
                let attrs = Attributes::of(e)?;
                let frame_no = attrs.require("fr")?;
                let ticks = attrs.require("ti")?;
                let text = r.text(o)?;
                let timeval = text
                    .trim()
                    .parse()
                    .map_err(|_| Error::invalid(format!("invalid timestamp '{}'", text)))?;
                sink.ts_item(frame_no, ticks, timeval)
            }
            "fr" => {
                let attrs = Attributes::of(e)?;
                let oid = attrs.require("ob")?;
                let pid = attrs.require("pr")?;
                let tid: u16 = attrs.require("pt")?;
                let t = ValueType::from_u16(tid).ok_or(Error::UnknownPropertyType(tid))?;
                let value = Value::parse(t, &r.text(o)?)?;
                sink.fr_item(oid, pid, &value)
            }
            _ => r.ignore(e, o, "frib"),
        })?;

        sink.frib_end(frib)
    }

    fn trailer(&mut self, open: bool, sink: &mut dyn ChunkSink) -> Result<()> {
        let trailer = sink.trailer_start()?;

        self.children(open, |r, e, o| match local_name(e).as_str() {
            "da" => {
                let attrs = Attributes::of(e)?;
                let id = attrs.require("dt")?;
                let data = r.text(o)?;
                sink.da_item(id, &data)
            }
            _ => r.ignore(e, o, "trailer"),
        })?;

        sink.trailer_end(trailer)
    }
}

impl<R: Read> ChunkSource for XmlReader<R> {
    fn replay(&mut self, sink: &mut dyn ChunkSink, progress: &mut Progress) -> Result<()> {
        let file = sink.start()?;
        let mut seen_fsib = false;

        loop {
            match self.next_node()? {
                Node::Element(ref e, o) if local_name(e) == "fsib" => {
                    if seen_fsib {
                        return Err(Error::invalid("more than one <fsib> element"));
                    }
                    seen_fsib = true;
                    self.fsib(o, sink, progress)?;
                }
                Node::Element(ref e, o) => self.ignore(e, o, "document")?,
                Node::Close => return Err(Error::invalid("unbalanced closing tag")),
                Node::Eof => break,
            }
        }

        if !seen_fsib {
            return Err(Error::invalid("no <fsib> element found"));
        }

        sink.end(file)
    }
}
