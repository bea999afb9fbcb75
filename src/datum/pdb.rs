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

//! PalmOS database (PDB) record walker. All numbers are big endian.

use error::{Error, Result};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::IResult;
use progress::ProgressRead;
use std::io::{self, Read};

pub const HEADER_SIZE: usize = 78;
const ENTRY_SIZE: usize = 8;
/// Two bytes of padding between the record list and the first record
const PLACEHOLDER_SIZE: u64 = 2;

#[derive(Debug, PartialEq)]
pub struct Header {
    pub name: String,
    pub version: u16,
    pub app_info: u32,
    pub db_type: [u8; 4],
    pub creator: [u8; 4],
    pub next_record_list: u32,
    pub num_records: u16,
}

/// One database record, `progress` is the fraction of the input consumed
/// once it has been read
pub struct Record<'a> {
    pub index: usize,
    pub data: &'a [u8],
    pub progress: f64,
}

pub fn zero_terminated(b: &[u8]) -> String {
    let end = b.iter().position(|&c| c == 0).unwrap_or(b.len());
    String::from_utf8_lossy(&b[..end]).into_owned()
}

fn four(i: &[u8]) -> IResult<&[u8], [u8; 4]> {
    let (i, b) = take(4_usize)(i)?;
    Ok((i, [b[0], b[1], b[2], b[3]]))
}

fn header(i: &[u8]) -> IResult<&[u8], Header> {
    let (i, name) = take(32_usize)(i)?;
    let (i, _attributes) = be_u16(i)?;
    let (i, version) = be_u16(i)?;
    // creation, modification and backup dates, modification number
    let (i, _) = take(16_usize)(i)?;
    let (i, app_info) = be_u32(i)?;
    let (i, _sort_info) = be_u32(i)?;
    let (i, db_type) = four(i)?;
    let (i, creator) = four(i)?;
    let (i, _unique_id_seed) = be_u32(i)?;
    let (i, next_record_list) = be_u32(i)?;
    let (i, num_records) = be_u16(i)?;

    Ok((
        i,
        Header {
            name: zero_terminated(name),
            version,
            app_info,
            db_type,
            creator,
            next_record_list,
            num_records,
        },
    ))
}

/// Offset of the record data, attributes and unique id are not used
fn record_entry(i: &[u8]) -> IResult<&[u8], u32> {
    let (i, offset) = be_u32(i)?;
    let (i, _attributes) = be_u8(i)?;
    let (i, _unique_id) = take(3_usize)(i)?;
    Ok((i, offset))
}

fn skip(input: &mut dyn ProgressRead, len: u64) -> Result<()> {
    let skipped = io::copy(&mut (&mut *input).take(len), &mut io::sink())?;
    if skipped < len {
        return Err(Error::invalid("unexpected end of file"));
    }
    Ok(())
}

/// Read the header of a database of type `db_type` and hand every record
/// to `f` in order. The application info block is skipped.
pub fn read_records<F>(input: &mut dyn ProgressRead, db_type: &[u8; 4], mut f: F) -> Result<Header>
where
    F: FnMut(&Record) -> Result<()>,
{
    let mut raw = [0_u8; HEADER_SIZE];
    input.read_exact(&mut raw).map_err(Error::truncated)?;
    let (_, hdr) = header(&raw).map_err(|_| Error::invalid("malformed PalmOS database header"))?;

    debug!(
        "PalmOS database '{}' version {} type '{}' creator '{}', {} records",
        hdr.name,
        hdr.version,
        zero_terminated(&hdr.db_type),
        zero_terminated(&hdr.creator),
        hdr.num_records
    );

    if &hdr.db_type != db_type {
        return Err(Error::invalid(format!(
            "PalmOS database type '{}' is not '{}'",
            zero_terminated(&hdr.db_type),
            zero_terminated(db_type)
        )));
    }

    if hdr.next_record_list != 0 {
        return Err(Error::invalid("PalmOS database uses chained record lists"));
    }

    let mut list = vec![0_u8; hdr.num_records as usize * ENTRY_SIZE];
    input.read_exact(&mut list).map_err(Error::truncated)?;

    let mut starts = Vec::with_capacity(hdr.num_records as usize + 1);
    if hdr.app_info != 0 {
        starts.push(hdr.app_info as u64);
    }
    for entry in list.chunks(ENTRY_SIZE) {
        let (_, offset) = record_entry(entry).map_err(|_| Error::invalid("malformed PalmOS record list"))?;
        starts.push(offset as u64);
    }

    skip(input, PLACEHOLDER_SIZE)?;
    let mut pos = (HEADER_SIZE + list.len()) as u64 + PLACEHOLDER_SIZE;
    let first_record = if hdr.app_info != 0 { 1 } else { 0 };

    let mut data = vec![];
    for (i, &start) in starts.iter().enumerate() {
        if start < pos {
            return Err(Error::invalid(format!(
                "PalmOS record at offset {} overlaps the previous one",
                start
            )));
        }
        if start > pos {
            debug!("skipping {} bytes before offset {}", start - pos, start);
            skip(input, start - pos)?;
            pos = start;
        }

        data.clear();
        match starts.get(i + 1) {
            Some(&end) => {
                let len = end.saturating_sub(start);
                (&mut *input).take(len).read_to_end(&mut data)?;
                if (data.len() as u64) < len {
                    return Err(Error::invalid("unexpected end of file"));
                }
            }
            None => {
                input.read_to_end(&mut data)?;
            }
        }
        pos += data.len() as u64;

        if i < first_record {
            trace!("skipping {} byte application info block", data.len());
            continue;
        }

        f(&Record {
            index: i - first_record,
            data: &data,
            progress: input.fraction_read(),
        })?;
    }

    Ok(hdr)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::{BigEndian, WriteBytesExt};
    use progress::TrackedReader;

    /// Database of type `db_type` holding `records`, with an optional
    /// application info block in front of them
    pub(crate) fn build(db_type: &[u8; 4], app_info: Option<&[u8]>, records: &[&[u8]]) -> Vec<u8> {
        let mut v = vec![];
        let mut name = b"Test DB".to_vec();
        name.resize(32, 0);
        v.extend_from_slice(&name);
        v.write_u16::<BigEndian>(0).unwrap();
        v.write_u16::<BigEndian>(1).unwrap();
        v.extend_from_slice(&[0_u8; 16]);

        let mut offset = (HEADER_SIZE + records.len() * ENTRY_SIZE) as u32 + PLACEHOLDER_SIZE as u32;
        match app_info {
            Some(a) => {
                v.write_u32::<BigEndian>(offset).unwrap();
                offset += a.len() as u32;
            }
            None => v.write_u32::<BigEndian>(0).unwrap(),
        }
        v.write_u32::<BigEndian>(0).unwrap();
        v.extend_from_slice(db_type);
        v.extend_from_slice(b"test");
        v.write_u32::<BigEndian>(0).unwrap();
        v.write_u32::<BigEndian>(0).unwrap();
        v.write_u16::<BigEndian>(records.len() as u16).unwrap();
        assert_eq!(v.len(), HEADER_SIZE);

        for (i, r) in records.iter().enumerate() {
            v.write_u32::<BigEndian>(offset).unwrap();
            v.push(0x40);
            v.extend_from_slice(&[0, 0, i as u8]);
            offset += r.len() as u32;
        }
        v.extend_from_slice(&[0, 0]);

        if let Some(a) = app_info {
            v.extend_from_slice(a);
        }
        for r in records {
            v.extend_from_slice(r);
        }

        v
    }

    fn collect(data: &[u8], db_type: &[u8; 4]) -> Result<Vec<(usize, Vec<u8>)>> {
        let mut out = vec![];
        let mut r = TrackedReader::new(data, Some(data.len() as u64));
        read_records(&mut r, db_type, |rec| {
            out.push((rec.index, rec.data.to_vec()));
            Ok(())
        })?;
        Ok(out)
    }

    #[test]
    fn test_header() {
        let db = build(b"strm", None, &[b"abc"]);
        let (rest, hdr) = header(&db).unwrap();
        assert_eq!(rest.len(), db.len() - HEADER_SIZE);
        assert_eq!(
            hdr,
            Header {
                name: "Test DB".to_string(),
                version: 1,
                app_info: 0,
                db_type: *b"strm",
                creator: *b"test",
                next_record_list: 0,
                num_records: 1,
            }
        );
    }

    #[test]
    fn test_records() {
        let db = build(b"strm", None, &[b"first", b"", b"third record"]);
        assert_eq!(
            collect(&db, b"strm").unwrap(),
            vec![
                (0, b"first".to_vec()),
                (1, vec![]),
                (2, b"third record".to_vec()),
            ]
        );
    }

    #[test]
    fn test_app_info_skipped() {
        let db = build(b"PwLg", Some(&b"application info"[..]), &[b"one", b"two"]);
        assert_eq!(
            collect(&db, b"PwLg").unwrap(),
            vec![(0, b"one".to_vec()), (1, b"two".to_vec())]
        );
    }

    #[test]
    fn test_progress_reaches_end() {
        let db = build(b"strm", None, &[b"a", b"b"]);
        let mut last = 0_f64;
        let mut r = TrackedReader::new(&db[..], Some(db.len() as u64));
        read_records(&mut r, b"strm", |rec| {
            assert!(rec.progress >= last);
            last = rec.progress;
            Ok(())
        })
        .unwrap();
        assert_eq!(last, 1_f64);
    }

    #[test]
    fn test_rejected() {
        let db = build(b"strm", None, &[b"abc"]);
        assert!(collect(&db, b"PwLg").is_err());
        assert!(collect(&db[..40], b"strm").is_err());

        let mut chained = db.clone();
        chained[75] = 1;
        assert!(collect(&chained, b"strm").is_err());

        // second record claims to start inside the first one
        let mut overlap = build(b"strm", None, &[b"abc", b"def"]);
        let first = (HEADER_SIZE + 2 * ENTRY_SIZE) as u8 + 2;
        overlap[HEADER_SIZE + ENTRY_SIZE + 3] = first - 1;
        assert!(collect(&overlap, b"strm").is_err());
    }
}
