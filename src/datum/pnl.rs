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

use super::pdb;
use error::Result;
use progress::{Progress, ProgressRead};
use std::io::Write;

const DB_TYPE: &[u8; 4] = b"PwLg";

/// Bytes of the sentence in a record, from `$` through the two checksum
/// digits after `*`
fn sentence(rec: &[u8]) -> Option<&[u8]> {
    let start = rec.iter().position(|&b| b == b'$')?;
    let star = start + rec[start..].iter().position(|&b| b == b'*')?;

    if star + 3 > rec.len() {
        return None;
    }

    Some(&rec[start..star + 3])
}

/// Copy the NMEA stream recorded in a PathAway log to `out`, one sentence
/// per record. Returns the number of sentences written.
pub fn extract(input: &mut dyn ProgressRead, out: &mut dyn Write, progress: &mut Progress) -> Result<usize> {
    let mut written = 0;

    pdb::read_records(input, DB_TYPE, |rec| {
        match sentence(rec.data) {
            Some(s) => {
                let s: Vec<u8> = s.iter().cloned().filter(|&b| b != 0).collect();
                out.write_all(&s)?;
                out.write_all(b"\r\n")?;
                written += 1;
            }
            None => warn!(
                "malformed sentence in record {}: '{}'",
                rec.index,
                pdb::zero_terminated(rec.data).escape_debug()
            ),
        }

        progress.update(rec.progress)
    })?;

    out.flush()?;
    debug!("extracted {} sentences", written);

    Ok(written)
}
