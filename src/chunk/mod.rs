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

//! Chunked container model shared by the binary and XML encodings.
//!
//! A container is described by a strictly nested sequence of calls:
//!
//! ```text
//! start
//!   fsib_start
//!     bfib_start                     (zero or more records)
//!       odib_start ob_item* odib_end (optional)
//!       pdib_start pr_item* pdib_end (optional)
//!       frib_start ts_item fr_item* frib_end (zero or more)
//!     bfib_end
//!     trailer_start da_item* trailer_end
//!   fsib_end
//! end
//! ```

use error::Result;
use progress::Progress;
use property::Value;

pub mod binary;
pub mod binary_reader;
#[cfg(test)]
pub mod recorder;
pub mod xml;
pub mod xml_reader;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ChunkKind {
    File,
    Fsib,
    Bfib,
    Odib,
    Pdib,
    Frib,
    Trailer,
}

impl ChunkKind {
    /// Tag written in front of the chunk in the binary encoding
    pub fn tag(self) -> &'static [u8; 4] {
        match self {
            ChunkKind::File => b"\0\0\0\0",
            ChunkKind::Fsib => b"FSIB",
            ChunkKind::Bfib => b"BFIB",
            ChunkKind::Odib => b"ODIB",
            ChunkKind::Pdib => b"PDIB",
            ChunkKind::Frib => b"FRIB",
            ChunkKind::Trailer => b"TAIB",
        }
    }

    /// Element name in the XML encoding
    pub fn element(self) -> &'static str {
        match self {
            ChunkKind::File => "",
            ChunkKind::Fsib => "fsib",
            ChunkKind::Bfib => "bfib",
            ChunkKind::Odib => "odib",
            ChunkKind::Pdib => "pdib",
            ChunkKind::Frib => "frib",
            ChunkKind::Trailer => "trailer",
        }
    }

    fn parent(self) -> Option<ChunkKind> {
        match self {
            ChunkKind::File => None,
            ChunkKind::Fsib => Some(ChunkKind::File),
            ChunkKind::Bfib | ChunkKind::Trailer => Some(ChunkKind::Fsib),
            ChunkKind::Odib | ChunkKind::Pdib | ChunkKind::Frib => Some(ChunkKind::Bfib),
        }
    }
}

/// Handle to an open chunk. It is handed out by a `*_start` call and must be
/// given back to the matching `*_end` call; it cannot be copied.
#[must_use = "an open chunk has to be passed to its end call"]
#[derive(PartialEq, Eq, Debug)]
pub struct Chunk {
    kind: ChunkKind,
    depth: usize,
}

impl Chunk {
    pub fn kind(&self) -> ChunkKind {
        self.kind
    }
}

/// Stack of open chunks kept by every sink. `T` is whatever the encoding
/// needs to remember about an open chunk (the binary writer keeps its start
/// offset there).
///
/// Nesting mistakes are bugs in the caller and panic.
#[derive(Debug)]
pub struct ChunkStack<T> {
    open: Vec<(ChunkKind, T)>,
}

impl<T> ChunkStack<T> {
    pub fn new() -> Self {
        ChunkStack { open: vec![] }
    }

    pub fn push(&mut self, kind: ChunkKind, data: T) -> Chunk {
        let parent = self.open.last().map(|&(k, _)| k);
        assert!(
            parent == kind.parent(),
            "cannot open {:?} chunk inside {:?}",
            kind,
            parent
        );

        self.open.push((kind, data));
        Chunk {
            kind,
            depth: self.open.len(),
        }
    }

    pub fn pop(&mut self, chunk: Chunk, kind: ChunkKind) -> T {
        assert!(
            chunk.kind == kind,
            "{:?} chunk passed to the end call of {:?}",
            chunk.kind,
            kind
        );
        assert!(
            chunk.depth == self.open.len(),
            "{:?} chunk closed while {} inner chunk(s) are still open",
            kind,
            self.open.len().saturating_sub(chunk.depth)
        );

        match self.open.pop() {
            Some((k, data)) => {
                debug_assert_eq!(k, kind);
                data
            }
            None => panic!("{:?} chunk closed twice", kind),
        }
    }

    /// Assert that items may be appended to a chunk of `kind` right now
    pub fn expect_top(&self, kind: ChunkKind) {
        let top = self.open.last().map(|&(k, _)| k);
        assert!(
            top == Some(kind),
            "item for {:?} chunk written while {:?} is open",
            kind,
            top
        );
    }

    pub fn top(&self) -> Option<&T> {
        self.open.last().map(|&(_, ref d)| d)
    }

    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.open.last_mut().map(|&mut (_, ref mut d)| d)
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Receiver of the container call sequence
pub trait ChunkSink {
    fn start(&mut self) -> Result<Chunk>;
    fn end(&mut self, file: Chunk) -> Result<()>;

    fn fsib_start(&mut self) -> Result<Chunk>;
    fn fsib_end(&mut self, fsib: Chunk) -> Result<()>;

    fn bfib_start(&mut self) -> Result<Chunk>;
    fn bfib_end(&mut self, bfib: Chunk) -> Result<()>;

    fn odib_start(&mut self) -> Result<Chunk>;
    fn ob_item(&mut self, oid: u16, name: &str) -> Result<()>;
    fn odib_end(&mut self, odib: Chunk) -> Result<()>;

    fn pdib_start(&mut self) -> Result<Chunk>;
    fn pr_item(&mut self, oid: u16, pid: u16, tid: u16, unit: &str, name: &str) -> Result<()>;
    fn pdib_end(&mut self, pdib: Chunk) -> Result<()>;

    fn frib_start(&mut self) -> Result<Chunk>;
    /// `timeval` is the absolute time in 1/256 seconds
    fn ts_item(&mut self, frame_no: u32, ticks: u32, timeval: i64) -> Result<()>;
    fn fr_item(&mut self, oid: u16, pid: u16, value: &Value) -> Result<()>;
    fn frib_end(&mut self, frib: Chunk) -> Result<()>;

    fn trailer_start(&mut self) -> Result<Chunk>;
    fn da_item(&mut self, id: u16, data: &str) -> Result<()>;
    fn trailer_end(&mut self, trailer: Chunk) -> Result<()>;
}

/// Producer of a container call sequence, replayed onto any sink
pub trait ChunkSource {
    fn replay(&mut self, sink: &mut dyn ChunkSink, progress: &mut Progress) -> Result<()>;
}
