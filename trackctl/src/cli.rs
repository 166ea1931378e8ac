//! Module describing all possible commands and sub-commands to the `trackctl` main driver
//!
//! We have three main commands:
//!
//! - `track`
//! - `parse`
//! - `list`
//!
//! `track` runs the polling loop: every `interval` seconds each source (radio, replay file,
//! aprs.fi) is asked for its frames, they are decoded and added to the tracks, the export file
//! is rewritten and a summary table printed.  It stops on Ctrl-C or when every source is done.
//!
//! `parse` decodes the frames given on the command-line (or `stdin`) and prints the reports, handy
//! to check what a TNC is spitting out.
//!
//! `completion` is here just to configure the various shells completion system.
//!

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{
    crate_authors, crate_description, crate_name, crate_version, Parser, Subcommand, ValueEnum,
};
use clap_complete::shells::Shell;

use skytrack_formats::Position;

/// CLI options
#[derive(Parser)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// configuration file.
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// debug mode.
    #[clap(short = 'D', long = "debug")]
    pub debug: bool,
    /// Log into hourly files in this directory.
    #[clap(short = 'L', long)]
    pub log_dir: Option<PathBuf>,
    /// Hierarchical output for traces.
    #[clap(short = 'T', long)]
    pub tree: bool,
    /// Verbose mode.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Sub-commands (see below).
    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

// ------

/// All sub-commands:
///
/// `completion SHELL`
/// `list formats`
/// `parse [FRAME...]`
/// `track [--radio DEV] [--replay FILE [--follow]] [--aprs-fi] [-s TIME] [-e TIME] [--launch LON,LAT] [-o FILE] [--record FILE]`
/// `version`
///
#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Generate Completion stuff
    Completion(ComplOpts),
    /// List export formats
    List(ListOpts),
    /// Decode frames and display them
    Parse(ParseOpts),
    /// Track balloons from one or more sources
    Track(TrackOpts),
    /// List all package versions
    Version,
}

// ------

/// Options for the tracking loop.  At least one source is needed.
///
#[derive(Debug, Default, Parser)]
pub struct TrackOpts {
    /// Serial device of the TNC.
    #[clap(short = 'r', long)]
    pub radio: Option<PathBuf>,
    /// Replay a frame log.
    #[clap(short = 'R', long)]
    pub replay: Option<PathBuf>,
    /// Keep reading the replay file as it grows.
    #[clap(short = 'f', long, requires = "replay")]
    pub follow: bool,
    /// Poll aprs.fi for the callsigns.
    #[clap(short = 'A', long = "aprs-fi")]
    pub aprs_fi: bool,
    /// Callsign to follow on aprs.fi, replaces the configured list (repeatable).
    #[clap(short = 'C', long = "callsign")]
    pub callsigns: Vec<String>,
    /// Seconds between two cycles, overrides the configuration.
    #[clap(short = 'i', long)]
    pub interval: Option<u64>,
    /// Export file, `.kml`, `.geojson` or `.json`.
    #[clap(short = 'o', long)]
    pub output: Option<PathBuf>,
    /// Append every frame received to this file (replay format).
    #[clap(long)]
    pub record: Option<PathBuf>,
    /// Ignore reports at or before this time (RFC 3339).
    #[clap(short = 's', long)]
    pub start: Option<DateTime<Utc>>,
    /// Ignore reports at or after this time (RFC 3339).
    #[clap(short = 'e', long)]
    pub end: Option<DateTime<Utc>>,
    /// Launch site as `LON,LAT`, adds the downrange distance to the output.
    #[clap(long, value_parser = parse_position, allow_hyphen_values = true)]
    pub launch: Option<Position>,
}

/// `LON,LAT` in signed degrees.
///
fn parse_position(s: &str) -> Result<Position, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or(format!("{s:?}: expected LON,LAT"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("longitude: {e}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
    if !(-180. ..=180.).contains(&lon) || !(-90. ..=90.).contains(&lat) {
        return Err(format!("{s:?}: out of range"));
    }
    Ok(Position::new(lon, lat))
}

// ------

#[derive(Debug, Parser)]
pub struct ParseOpts {
    /// Frames to decode, read from `stdin` when none.
    pub frames: Vec<String>,
}

// ------

/// Options to generate completion files at runtime
///
#[derive(Debug, Parser)]
pub struct ComplOpts {
    #[clap(value_parser)]
    pub shell: Shell,
}

// ------

/// All  `list` sub-commands:
///
/// `list formats`
///
#[derive(Debug, Parser)]
pub struct ListOpts {
    #[clap(value_parser)]
    pub cmd: ListSubCommand,
}

/// These are the sub-commands for `list`
///
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, ValueEnum)]
pub enum ListSubCommand {
    /// List all export formats
    Formats,
}
