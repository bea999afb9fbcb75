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
use byteorder::{LittleEndian, WriteBytesExt};
use error::Error;
use std::io::{self, Seek, SeekFrom, Write};

pub const FORMAT_VERSION: u16 = 0x0008;
pub const HOST_VERSION: u16 = 0x0800;
/// Size of tag plus size field
pub const HEADER_SIZE: u64 = 8;
pub const BLOCK_SIZE: usize = 4096;

/// Byte sink that can go back and fill in a chunk size
pub trait ChunkOutput: Write {
    fn position(&self) -> u64;
    fn patch_u32(&mut self, at: u64, v: u32) -> io::Result<()>;
    /// Called whenever no open chunk still needs patching
    fn flush_chunks(&mut self) -> io::Result<()>;
}

/// Output that supports seeking, sizes are patched in place
pub struct Seekable<W> {
    inner: W,
    pos: u64,
}

impl<W: Write + Seek> Seekable<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        let pos = inner.seek(SeekFrom::Current(0))?;
        Ok(Seekable { inner, pos })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Seekable<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek> ChunkOutput for Seekable<W> {
    fn position(&self) -> u64 {
        self.pos
    }

    fn patch_u32(&mut self, at: u64, v: u32) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(at))?;
        self.inner.write_u32::<LittleEndian>(v)?;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        Ok(())
    }

    fn flush_chunks(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Output that cannot seek. Everything is kept in memory until the open
/// chunks are complete, then written out in `block_size` pieces.
pub struct Buffered<W> {
    inner: W,
    buf: Vec<u8>,
    flushed: u64,
    block_size: usize,
}

impl<W: Write> Buffered<W> {
    pub fn new(inner: W, block_size: usize) -> Self {
        Buffered {
            inner,
            buf: Vec::with_capacity(block_size),
            flushed: 0,
            block_size: block_size.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Buffered<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> ChunkOutput for Buffered<W> {
    fn position(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    fn patch_u32(&mut self, at: u64, v: u32) -> io::Result<()> {
        if at < self.flushed || at + 4 > self.position() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("chunk size at offset {} is no longer buffered", at),
            ));
        }

        let i = (at - self.flushed) as usize;
        (&mut self.buf[i..i + 4]).write_u32::<LittleEndian>(v)
    }

    fn flush_chunks(&mut self) -> io::Result<()> {
        for block in self.buf.chunks(self.block_size) {
            self.inner.write_all(block)?;
        }
        self.flushed += self.buf.len() as u64;
        self.buf.clear();
        self.inner.flush()
    }
}

/// Writes the binary FSR encoding
pub struct BinaryWriter<O> {
    out: O,
    /// start offset of every open chunk that carries a size field
    stack: ChunkStack<Option<u64>>,
}

impl<W: Write + Seek> BinaryWriter<Seekable<W>> {
    pub fn new(w: W) -> Result<Self> {
        Ok(BinaryWriter {
            out: Seekable::new(w)?,
            stack: ChunkStack::new(),
        })
    }
}

impl<W: Write> BinaryWriter<Buffered<W>> {
    pub fn buffered(w: W) -> Self {
        Self::with_block_size(w, BLOCK_SIZE)
    }

    pub fn with_block_size(w: W, block_size: usize) -> Self {
        BinaryWriter {
            out: Buffered::new(w, block_size),
            stack: ChunkStack::new(),
        }
    }
}

impl<O: ChunkOutput> BinaryWriter<O> {
    pub fn into_output(self) -> O {
        self.out
    }

    fn open(&mut self, kind: ChunkKind) -> Result<Chunk> {
        let chunk = self.stack.push(kind, Some(self.out.position()));
        self.out.write_all(kind.tag())?;
        self.out.write_u32::<LittleEndian>(0)?;
        Ok(chunk)
    }

    fn close(&mut self, chunk: Chunk, kind: ChunkKind) -> Result<()> {
        if let Some(start) = self.stack.pop(chunk, kind) {
            let size = self.out.position() - start;
            self.out.patch_u32(start + 4, size as u32)?;
        }
        Ok(())
    }

    /// Bytes written so far into the innermost open chunk, header included
    fn current_size(&self) -> u64 {
        match self.stack.top() {
            Some(&Some(start)) => self.out.position() - start,
            _ => 0,
        }
    }

    fn pad_to_word(&mut self) -> Result<()> {
        while self.current_size() % 4 != 0 {
            self.out.write_u8(0)?;
        }
        Ok(())
    }
}

fn len16(s: &str) -> Result<u16> {
    if s.len() > u16::max_value() as usize {
        return Err(Error::invalid(format!("string of {} bytes is too long", s.len())));
    }
    Ok(s.len() as u16)
}

impl<O: ChunkOutput> ChunkSink for BinaryWriter<O> {
    fn start(&mut self) -> Result<Chunk> {
        Ok(self.stack.push(ChunkKind::File, None))
    }

    fn end(&mut self, file: Chunk) -> Result<()> {
        self.stack.pop(file, ChunkKind::File);
        self.out.flush_chunks()?;
        Ok(())
    }

    fn fsib_start(&mut self) -> Result<Chunk> {
        let chunk = self.stack.push(ChunkKind::Fsib, None);
        self.out.write_all(ChunkKind::Fsib.tag())?;
        self.out.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        self.out.write_u16::<LittleEndian>(HOST_VERSION)?;
        Ok(chunk)
    }

    fn fsib_end(&mut self, fsib: Chunk) -> Result<()> {
        self.stack.pop(fsib, ChunkKind::Fsib);
        self.out.flush_chunks()?;
        Ok(())
    }

    fn bfib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Bfib)
    }

    fn bfib_end(&mut self, bfib: Chunk) -> Result<()> {
        let size = self.current_size() as u32;
        // footer: crc (unused) and total size
        self.out.write_u32::<LittleEndian>(0)?;
        self.out.write_u32::<LittleEndian>(size + HEADER_SIZE as u32)?;
        self.close(bfib, ChunkKind::Bfib)?;
        self.out.flush_chunks()?;
        Ok(())
    }

    fn odib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Odib)
    }

    fn ob_item(&mut self, oid: u16, name: &str) -> Result<()> {
        self.stack.expect_top(ChunkKind::Odib);
        self.out.write_u16::<LittleEndian>(oid)?;
        self.out.write_u16::<LittleEndian>(len16(name)?)?;
        self.out.write_all(name.as_bytes())?;
        Ok(())
    }

    fn odib_end(&mut self, odib: Chunk) -> Result<()> {
        self.close(odib, ChunkKind::Odib)
    }

    fn pdib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Pdib)
    }

    fn pr_item(&mut self, oid: u16, pid: u16, tid: u16, unit: &str, name: &str) -> Result<()> {
        self.stack.expect_top(ChunkKind::Pdib);
        self.out.write_u16::<LittleEndian>(oid)?;
        self.out.write_u16::<LittleEndian>(pid)?;
        self.out.write_u16::<LittleEndian>(tid)?;
        self.out.write_u16::<LittleEndian>(len16(name)?)?;
        self.out.write_u16::<LittleEndian>(len16(unit)?)?;
        self.out.write_all(name.as_bytes())?;
        self.out.write_all(unit.as_bytes())?;
        Ok(())
    }

    fn pdib_end(&mut self, pdib: Chunk) -> Result<()> {
        self.close(pdib, ChunkKind::Pdib)
    }

    fn frib_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Frib)
    }

    fn ts_item(&mut self, frame_no: u32, ticks: u32, timeval: i64) -> Result<()> {
        self.stack.expect_top(ChunkKind::Frib);
        self.out.write_i64::<LittleEndian>(timeval)?;
        self.out.write_u32::<LittleEndian>(frame_no)?;
        self.out.write_u32::<LittleEndian>(ticks)?;
        Ok(())
    }

    fn fr_item(&mut self, oid: u16, pid: u16, value: &Value) -> Result<()> {
        self.stack.expect_top(ChunkKind::Frib);
        self.out.write_u16::<LittleEndian>(oid)?;
        self.out.write_u16::<LittleEndian>(pid)?;
        self.out.write_u16::<LittleEndian>(value.value_type().id())?;

        match *value {
            Value::Bool(b) => self.out.write_u16::<LittleEndian>(b as u16)?,
            Value::Double(d) => self.out.write_f64::<LittleEndian>(d)?,
            Value::Int(i) => self.out.write_i32::<LittleEndian>(i)?,
            Value::Str(ref s) => {
                self.out.write_u32::<LittleEndian>(s.len() as u32)?;
                self.out.write_all(s.as_bytes())?;
            }
        }

        Ok(())
    }

    fn frib_end(&mut self, frib: Chunk) -> Result<()> {
        self.pad_to_word()?;
        self.close(frib, ChunkKind::Frib)
    }

    fn trailer_start(&mut self) -> Result<Chunk> {
        self.open(ChunkKind::Trailer)
    }

    fn da_item(&mut self, id: u16, data: &str) -> Result<()> {
        self.stack.expect_top(ChunkKind::Trailer);
        let len = len16(data)?;
        self.out.write_u16::<LittleEndian>(id)?;
        self.out.write_u16::<LittleEndian>(len)?;
        self.out.write_all(data.as_bytes())?;
        for _ in 0..((4 - (len & 3)) & 3) {
            self.out.write_u8(0)?;
        }
        Ok(())
    }

    fn trailer_end(&mut self, trailer: Chunk) -> Result<()> {
        let size = self.current_size() as u32;
        self.out.write_all(ChunkKind::Trailer.tag())?;
        self.out.write_u32::<LittleEndian>(size + HEADER_SIZE as u32)?;
        self.close(trailer, ChunkKind::Trailer)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Small container touching every item kind
    pub(crate) fn write_sample<S: ChunkSink + ?Sized>(w: &mut S) {
        let file = w.start().unwrap();
        let fsib = w.fsib_start().unwrap();

        let bfib = w.bfib_start().unwrap();
        let odib = w.odib_start().unwrap();
        w.ob_item(4096, "UserAircraft").unwrap();
        w.odib_end(odib).unwrap();
        let frib = w.frib_start().unwrap();
        w.ts_item(0, 1, 256).unwrap();
        w.fr_item(4096, 39, &Value::Int(-1)).unwrap();
        w.frib_end(frib).unwrap();
        w.bfib_end(bfib).unwrap();

        let trailer = w.trailer_start().unwrap();
        w.da_item(1, "abc").unwrap();
        w.trailer_end(trailer).unwrap();

        w.fsib_end(fsib).unwrap();
        w.end(file).unwrap();
    }

    pub(crate) const SAMPLE: [u8; 108] = [
        b'F', b'S', b'I', b'B', 0x08, 0x00, 0x00, 0x08,
        // record
        b'B', b'F', b'I', b'B', 76, 0, 0, 0,
        b'O', b'D', b'I', b'B', 24, 0, 0, 0,
        0x00, 0x10, 12, 0,
        b'U', b's', b'e', b'r', b'A', b'i', b'r', b'c', b'r', b'a', b'f', b't',
        b'F', b'R', b'I', b'B', 36, 0, 0, 0,
        0x00, 0x01, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0,
        1, 0, 0, 0,
        0x00, 0x10, 39, 0, 3, 0, 0xFF, 0xFF, 0xFF, 0xFF,
        0, 0,
        // record footer
        0, 0, 0, 0, 76, 0, 0, 0,
        // trailer
        b'T', b'A', b'I', b'B', 24, 0, 0, 0,
        1, 0, 3, 0, b'a', b'b', b'c', 0,
        b'T', b'A', b'I', b'B', 24, 0, 0, 0,
    ];

    /// Checks that every sized chunk declares its real length. Returns the
    /// number of chunks visited.
    pub(crate) fn check_chunk_sizes(data: &[u8]) -> usize {
        assert_eq!(&data[..4], b"FSIB");
        let mut visited = 0;
        let mut pos = 8;

        while pos < data.len() {
            let size = le32(&data[pos + 4..]) as usize;
            let end = pos + size;
            assert!(end <= data.len(), "chunk at {} overruns the file", pos);

            match &data[pos..pos + 4] {
                b"BFIB" => {
                    // footer repeats the total size
                    assert_eq!(le32(&data[end - 4..]) as usize, size);
                    let mut sub = pos + 8;
                    while sub < end - 8 {
                        let sub_size = le32(&data[sub + 4..]) as usize;
                        assert!(sub_size >= 8 && sub + sub_size <= end - 8);
                        if &data[sub..sub + 4] == b"FRIB" {
                            assert_eq!(sub_size % 4, 0);
                        }
                        sub += sub_size;
                        visited += 1;
                    }
                    assert_eq!(sub, end - 8);
                }
                b"TAIB" => {
                    assert_eq!(&data[end - 8..end - 4], b"TAIB");
                    assert_eq!(le32(&data[end - 4..]) as usize, size);
                }
                other => panic!("unexpected chunk {:?}", other),
            }

            visited += 1;
            pos = end;
        }

        assert_eq!(pos, data.len());
        visited
    }

    fn le32(b: &[u8]) -> u32 {
        b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16 | (b[3] as u32) << 24
    }

    #[test]
    fn test_seekable_layout() {
        let mut w = BinaryWriter::new(Cursor::new(vec![])).unwrap();
        write_sample(&mut w);
        let out = w.into_output().into_inner().into_inner();

        assert_eq!(&out[..], &SAMPLE[..]);
        assert_eq!(check_chunk_sizes(&out), 4);
    }

    #[test]
    fn test_buffered_matches_seekable() {
        let mut w = BinaryWriter::with_block_size(vec![], 5);
        write_sample(&mut w);
        let out = w.into_output().into_inner();

        assert_eq!(&out[..], &SAMPLE[..]);
    }

    #[test]
    fn test_buffered_flushes_after_record() {
        let mut w = BinaryWriter::buffered(vec![]);
        let file = w.start().unwrap();
        let fsib = w.fsib_start().unwrap();
        let bfib = w.bfib_start().unwrap();
        assert!(w.out.inner.is_empty());
        w.bfib_end(bfib).unwrap();

        // header and the empty record are out, nothing is held back
        assert_eq!(w.out.inner.len(), 8 + 16);
        assert!(w.out.buf.is_empty());
        assert_eq!(&w.out.inner[8..], &[
            b'B', b'F', b'I', b'B', 16, 0, 0, 0,
            0, 0, 0, 0, 16, 0, 0, 0,
        ]);

        w.fsib_end(fsib).unwrap();
        w.end(file).unwrap();
    }

    #[test]
    fn test_frame_values() {
        let mut w = BinaryWriter::new(Cursor::new(vec![])).unwrap();
        let file = w.start().unwrap();
        let fsib = w.fsib_start().unwrap();
        let bfib = w.bfib_start().unwrap();
        let frib = w.frib_start().unwrap();
        w.ts_item(7, 9, -1).unwrap();
        w.fr_item(4096, 7, &Value::Bool(true)).unwrap();
        w.fr_item(4096, 1, &Value::Double(1.5)).unwrap();
        w.fr_item(8192, 50, &Value::Str("xy".to_string())).unwrap();
        w.frib_end(frib).unwrap();
        w.bfib_end(bfib).unwrap();
        w.fsib_end(fsib).unwrap();
        w.end(file).unwrap();

        let out = w.into_output().into_inner().into_inner();
        let frib = &out[16..];

        assert_eq!(&frib[..8], &[b'F', b'R', b'I', b'B', 60, 0, 0, 0]);
        assert_eq!(&frib[8..24], &[
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
            7, 0, 0, 0,
            9, 0, 0, 0,
        ]);
        assert_eq!(&frib[24..32], &[0x00, 0x10, 7, 0, 1, 0, 1, 0]);
        assert_eq!(&frib[32..46], &[
            0x00, 0x10, 1, 0, 2, 0,
            0, 0, 0, 0, 0, 0, 0xF8, 0x3F,
        ]);
        assert_eq!(&frib[46..60], &[
            0x00, 0x20, 50, 0, 4, 0,
            2, 0, 0, 0, b'x', b'y',
            0, 0,
        ]);
    }

    #[test]
    #[should_panic(expected = "item for")]
    fn test_item_outside_chunk() {
        let mut w = BinaryWriter::buffered(vec![]);
        let _file = w.start().unwrap();
        let _fsib = w.fsib_start().unwrap();
        let _bfib = w.bfib_start().unwrap();
        w.ob_item(4096, "UserAircraft").unwrap();
    }
}
