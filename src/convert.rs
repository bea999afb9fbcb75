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

//! File level conversions: picks reader and writer from the file names and
//! only leaves an output file behind when the whole conversion succeeded.

use chunk::binary::BinaryWriter;
use chunk::binary_reader::BinaryReader;
use chunk::xml::XmlWriter;
use chunk::xml_reader::XmlReader;
use chunk::ChunkSource;
use datum::ctl::CtlReader;
use datum::gpx::GpxReader;
use datum::nmea::NmeaReader;
use datum::{pnl, DatumProducer};
use engine::{self, AuxiliaryData};
use error::{Error, Result};
use progress::{Progress, TrackedReader, LARGE_INTERVAL, SMALL_INTERVAL};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum FileType {
    /// Binary simulator video
    Fsr,
    /// XML rendition of a simulator video
    Xml,
    Nmea,
    Gpx,
    /// Cetus GPS track log
    Ctl,
    /// PathAway log holding NMEA sentences
    Pnl,
}

impl FileType {
    /// Guess the type from the file extension, ignoring case
    pub fn from_path(p: &Path) -> Option<FileType> {
        let ext = p.extension()?.to_str()?.to_ascii_lowercase();

        match ext.as_str() {
            "fsr" => Some(FileType::Fsr),
            "xml" => Some(FileType::Xml),
            "nmea" | "nma" => Some(FileType::Nmea),
            "gpx" => Some(FileType::Gpx),
            "ctl" | "pdb" => Some(FileType::Ctl),
            "pnl" => Some(FileType::Pnl),
            _ => None,
        }
    }

    /// Reader for the track log types
    pub fn producer(self) -> Option<Box<dyn DatumProducer>> {
        match self {
            FileType::Nmea => Some(Box::new(NmeaReader::new())),
            FileType::Gpx => Some(Box::new(GpxReader)),
            FileType::Ctl => Some(Box::new(CtlReader::new())),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FileType::Fsr => "FSR",
            FileType::Xml => "XML",
            FileType::Nmea => "NMEA",
            FileType::Gpx => "GPX",
            FileType::Ctl => "CTL",
            FileType::Pnl => "PNL",
        }
    }
}

/// Supported pairs of input and output types
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Conversion {
    FsrToXml,
    XmlToFsr,
    /// Track log into a video, the output is `Fsr` or `Xml`
    Track { from: FileType, to: FileType },
    PnlToNmea,
}

impl Conversion {
    pub fn between(from: FileType, to: FileType) -> Option<Conversion> {
        use self::FileType::*;

        match (from, to) {
            (Fsr, Xml) => Some(Conversion::FsrToXml),
            (Xml, Fsr) => Some(Conversion::XmlToFsr),
            (Nmea, Fsr) | (Nmea, Xml) | (Gpx, Fsr) | (Gpx, Xml) | (Ctl, Fsr) | (Ctl, Xml) => {
                Some(Conversion::Track { from, to })
            }
            (Pnl, Nmea) => Some(Conversion::PnlToNmea),
            _ => None,
        }
    }

    /// Conversion implied by the names of `input` and `output`
    pub fn for_paths(input: &Path, output: &Path) -> Result<Conversion> {
        let from = FileType::from_path(input);
        let to = FileType::from_path(output);

        let conversion = match (from, to) {
            (Some(from), Some(to)) => Conversion::between(from, to),
            _ => None,
        };

        conversion.ok_or_else(|| Error::Unsupported {
            from: describe(input, from),
            to: describe(output, to),
        })
    }

    /// How often progress is worth reporting for this conversion
    pub fn progress_interval(self) -> Duration {
        match self {
            Conversion::PnlToNmea => SMALL_INTERVAL,
            _ => LARGE_INTERVAL,
        }
    }

    /// Convert `input` (`len` bytes if known) into `output`
    pub fn run<R, W>(
        self,
        input: R,
        len: Option<u64>,
        output: W,
        aux: &AuxiliaryData,
        progress: &mut Progress,
    ) -> Result<()>
    where
        R: Read,
        W: Write + Seek,
    {
        match self {
            Conversion::FsrToXml => {
                let mut sink = XmlWriter::new(BufWriter::new(output));
                BinaryReader::new(input, len).replay(&mut sink, progress)?;
                sink.into_inner().flush()?;
            }
            Conversion::XmlToFsr => {
                let mut sink = BinaryWriter::new(BufWriter::new(output))?;
                XmlReader::new(input, len).replay(&mut sink, progress)?;
                sink.into_output().into_inner().flush()?;
            }
            Conversion::Track { from, to } => {
                let mut producer = from.producer().ok_or_else(|| unsupported(from, to))?;
                let mut input = TrackedReader::new(input, len);

                match to {
                    FileType::Xml => {
                        let mut sink = XmlWriter::new(BufWriter::new(output));
                        engine::convert(&mut *producer, &mut input, &mut sink, aux, progress)?;
                        sink.into_inner().flush()?;
                    }
                    FileType::Fsr => {
                        let mut sink = BinaryWriter::new(BufWriter::new(output))?;
                        engine::convert(&mut *producer, &mut input, &mut sink, aux, progress)?;
                        sink.into_output().into_inner().flush()?;
                    }
                    _ => return Err(unsupported(from, to)),
                }
            }
            Conversion::PnlToNmea => {
                let mut input = TrackedReader::new(input, len);
                let n = pnl::extract(&mut input, &mut BufWriter::new(output), progress)?;
                info!("extracted {} NMEA sentences", n);
            }
        }

        Ok(())
    }
}

fn unsupported(from: FileType, to: FileType) -> Error {
    Error::Unsupported {
        from: from.name().to_string(),
        to: to.name().to_string(),
    }
}

fn describe(p: &Path, t: Option<FileType>) -> String {
    match t {
        Some(t) => t.name().to_string(),
        None => format!("'{}'", p.display()),
    }
}

/// Convert the file `input` into the file `output`, whose types are taken
/// from their extensions. An existing output is only replaced when
/// `overwrite` is set.
pub fn convert_file(
    input: &Path,
    output: &Path,
    aux: &AuxiliaryData,
    overwrite: bool,
    progress: &mut Progress,
) -> Result<()> {
    let conversion = Conversion::for_paths(input, output)?;

    if !input.is_file() {
        return Err(Error::NotFound(input.to_path_buf()));
    }
    if output.exists() && !overwrite {
        return Err(Error::OutputExists(output.to_path_buf()));
    }

    let file = File::open(input)?;
    let len = file.metadata()?.len();

    let dir = match output.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    // removed again when dropped, unless persisted below
    let mut tmp = NamedTempFile::new_in(dir)?;

    debug!(
        "{:?}: {} ({} bytes) -> {} via {}",
        conversion,
        input.display(),
        len,
        output.display(),
        tmp.path().display()
    );

    conversion.run(BufReader::new(file), Some(len), tmp.as_file_mut(), aux, progress)?;

    tmp.persist(output).map_err(|e| Error::Io(e.error))?;
    info!("converted {} to {}", input.display(), output.display());

    Ok(())
}
