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

#[macro_use]
extern crate log;
extern crate chrono;
extern crate clap;
extern crate env_logger;
extern crate fsrtool;
extern crate serde_json;

use chrono::prelude::*;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use fsrtool::chunk::binary::BinaryWriter;
use fsrtool::chunk::binary_reader::BinaryReader;
use fsrtool::chunk::xml_reader::XmlReader;
use fsrtool::chunk::ChunkSource;
use fsrtool::convert::{convert_file, Conversion, FileType};
use fsrtool::datum::TrackSample;
use fsrtool::engine::AuxiliaryData;
use fsrtool::error::{Error, Result};
use fsrtool::handle::{Handle, Pushable};
use fsrtool::player::PacedSink;
use fsrtool::progress::{Progress, TrackedReader, LARGE_INTERVAL};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::process;
use std::time::Duration;

fn app<'a, 'b>() -> App<'a, 'b> {
    let track_options = [
        Arg::with_name("aux")
            .long("aux")
            .value_name("FILE")
            .help("JSON file with conversion settings, flags below override it")
            .takes_value(true),
        Arg::with_name("name")
            .long("name")
            .help("Recording name stored in the trailer")
            .takes_value(true),
        Arg::with_name("description")
            .long("description")
            .help("Recording description stored in the trailer")
            .takes_value(true),
        Arg::with_name("rate")
            .long("rate")
            .value_name("TICKS")
            .help("Frames per second of track [default: 18]")
            .takes_value(true),
        Arg::with_name("start")
            .long("start")
            .value_name("SECONDS")
            .help("Seconds of track skipped before the first frame")
            .takes_value(true),
        Arg::with_name("duration")
            .long("duration")
            .value_name("SECONDS")
            .help("Seconds of track converted")
            .takes_value(true),
        Arg::with_name("start-time")
            .long("start-time")
            .value_name("RFC3339")
            .help("Move the recording to start at this time")
            .takes_value(true),
        Arg::with_name("min-altitude")
            .long("min-altitude")
            .value_name("FEET")
            .help("Altitude at or below which the aircraft is on the ground")
            .takes_value(true),
        Arg::with_name("no-jitter-reduction")
            .long("no-jitter-reduction")
            .help("Keep following the course while the aircraft stands still"),
    ];

    App::new("fsrtool")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts GPS track logs into flight simulator video recordings")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("convert")
                .about("Convert between file types, chosen by extension")
                .arg(Arg::with_name("INPUT").required(true).index(1))
                .arg(Arg::with_name("OUTPUT").required(true).index(2))
                .arg(
                    Arg::with_name("force")
                        .short("f")
                        .long("force")
                        .help("Replace an existing output file"),
                )
                .args(&track_options),
        )
        .subcommand(
            SubCommand::with_name("play")
                .about("Replay an FSR or XML recording in real time as FSR")
                .arg(Arg::with_name("INPUT").required(true).index(1))
                .arg(
                    Arg::with_name("OUTPUT")
                        .help("Pipe or file to play into [default: standard output]")
                        .index(2),
                )
                .arg(
                    Arg::with_name("rate")
                        .long("rate")
                        .value_name("TICKS")
                        .help("Ticks per second of the recording [default: 18]")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("track")
                .about("Print the samples of a track log as JSON lines")
                .arg(Arg::with_name("INPUT").required(true).index(1)),
        )
}

fn number(m: &ArgMatches, name: &str) -> Result<Option<f64>> {
    match m.value_of(name) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("invalid --{} value '{}'", name, v))),
        None => Ok(None),
    }
}

fn auxiliary(m: &ArgMatches) -> Result<AuxiliaryData> {
    let mut aux = match m.value_of("aux") {
        Some(p) => AuxiliaryData::from_reader(BufReader::new(File::open(p)?))?,
        None => AuxiliaryData::default(),
    };

    if let Some(v) = m.value_of("name") {
        aux.name = v.to_string();
    }
    if let Some(v) = m.value_of("description") {
        aux.description = v.to_string();
    }
    if let Some(v) = number(m, "rate")? {
        aux.ticks_per_second = v;
    }
    if let Some(v) = number(m, "start")? {
        aux.start_second = v;
    }
    if let Some(v) = number(m, "duration")? {
        aux.total_seconds = Some(v);
    }
    if let Some(v) = m.value_of("start-time") {
        let t = DateTime::parse_from_rfc3339(v)
            .map_err(|e| Error::InvalidConfig(format!("invalid --start-time '{}': {}", v, e)))?;
        aux.start_time = Some(t.with_timezone(&Utc));
    }
    if let Some(v) = number(m, "min-altitude")? {
        aux.minimum_altitude = Some(v);
    }
    if m.is_present("no-jitter-reduction") {
        aux.jitter_reduction = false;
    }

    aux.validate()?;
    debug!("conversion settings: {:?}", aux);
    Ok(aux)
}

/// Progress line on stderr, never cancels
fn progress_bar<'a>(interval: Duration) -> Progress<'a> {
    Progress::new(interval, |fraction| {
        eprint!("\r{:5.1}%", fraction * 100_f64);
        false
    })
}

fn convert(m: &ArgMatches) -> Result<()> {
    let input = Path::new(m.value_of("INPUT").unwrap_or_default());
    let output = Path::new(m.value_of("OUTPUT").unwrap_or_default());

    let conversion = Conversion::for_paths(input, output)?;
    let aux = auxiliary(m)?;
    let mut progress = progress_bar(conversion.progress_interval());

    let r = convert_file(input, output, &aux, m.is_present("force"), &mut progress);
    eprintln!();
    r?;

    eprintln!("{} written", output.display());
    Ok(())
}

fn play(m: &ArgMatches) -> Result<()> {
    let input = Path::new(m.value_of("INPUT").unwrap_or_default());
    let tps = number(m, "rate")?.unwrap_or(fsrtool::engine::auxiliary::DEFAULT_TICKS_PER_SECOND);

    let kind = FileType::from_path(input);
    match kind {
        Some(FileType::Fsr) | Some(FileType::Xml) => {}
        _ => {
            return Err(Error::Unsupported {
                from: format!("'{}'", input.display()),
                to: "playback".to_string(),
            })
        }
    }

    if !input.is_file() {
        return Err(Error::NotFound(input.to_path_buf()));
    }
    let file = File::open(input)?;
    let len = file.metadata()?.len();

    let out: Box<dyn Write> = match m.value_of("OUTPUT") {
        Some(p) => Box::new(File::create(p)?),
        None => Box::new(io::stdout()),
    };
    let mut sink = PacedSink::new(BinaryWriter::buffered(out), tps)?;

    info!("playing {} at {} ticks per second", input.display(), tps);
    let mut progress = Progress::none();
    if kind == Some(FileType::Fsr) {
        BinaryReader::new(BufReader::new(file), Some(len)).replay(&mut sink, &mut progress)?;
    } else {
        XmlReader::new(BufReader::new(file), Some(len)).replay(&mut sink, &mut progress)?;
    }

    sink.into_inner().into_output().into_inner().flush()?;
    Ok(())
}

/// Writes every sample as one line of JSON
struct JsonLines<'p, W> {
    out: W,
    progress: Progress<'p>,
    count: usize,
}

impl<'p, W: Write> Handle for JsonLines<'p, W> {
    fn report_progress(&mut self, fraction: f64) -> Result<()> {
        self.progress.update(fraction)
    }
}

impl<'p, W: Write> Pushable<TrackSample> for JsonLines<'p, W> {
    fn push_data(&mut self, s: TrackSample) -> Result<()> {
        serde_json::to_writer(&mut self.out, &s)?;
        self.out.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }
}

fn track(m: &ArgMatches) -> Result<()> {
    let input = Path::new(m.value_of("INPUT").unwrap_or_default());

    let mut producer = match FileType::from_path(input).and_then(|t| t.producer()) {
        Some(p) => p,
        None => {
            return Err(Error::Unsupported {
                from: format!("'{}'", input.display()),
                to: "track samples".to_string(),
            })
        }
    };

    if !input.is_file() {
        return Err(Error::NotFound(input.to_path_buf()));
    }
    let file = File::open(input)?;
    let len = file.metadata()?.len();
    let mut reader = TrackedReader::new(BufReader::new(file), Some(len));

    let stdout = io::stdout();
    let mut lines = JsonLines {
        out: BufWriter::new(stdout.lock()),
        progress: progress_bar(LARGE_INTERVAL),
        count: 0,
    };

    producer.parse(&mut reader, &mut lines)?;
    lines.out.flush()?;
    eprintln!();

    info!("{} samples", lines.count);
    Ok(())
}

fn main() {
    env_logger::init();

    let matches = app().get_matches();
    let r = match matches.subcommand() {
        ("convert", Some(m)) => convert(m),
        ("play", Some(m)) => play(m),
        ("track", Some(m)) => track(m),
        _ => Ok(()),
    };

    if let Err(e) = r {
        if e.is_expected() {
            eprintln!("fsrtool: {}", e);
        } else {
            error!("{:?}", e);
            eprintln!("fsrtool: {}", e);
        }
        process::exit(1);
    }
}
