//! Turning movement counts (TMCs) from the City of Boston, geocoded, normalized against the
//! hourly rates of automated traffic recorders (ATRs), and consolidated into CSV tables.
//!
//! The work is split across three programs (see `src/bin/`):
//!   - `parse_tmcs` - geocode the TMC files, compute the [normalization factor][normalize],
//!     and [extract][extract_from_sheet] the counts from every workbook.
//!   - `snap_tmcs` - [snap][snap] the geocoded TMCs to the nearest intersection and road segment.
//!   - `plot_tmcs` - draw TMCs and ATRs on an [interactive map][map].
//!
//! ## Filenames
//!
//! Each TMC workbook is named `<id>_<id2>_<INTERSECTION>_<DATE>.XLS`, where `INTERSECTION` is a
//! comma-separated list of streets with hyphens in place of spaces, e.g.
//! `6822_86_BERKELEY-ST,-NEWBURY-ST_20150101.XLS`.
//!
//! ## Workbook formats
//!
//! Two layouts are recognized (see [`format`]):
//!   - Format 1 - one sheet per mode ("All Motors Hr.", "All Peds Hr.", "Bicycles Hr."), each
//!     with hourly counts in four directions.
//!   - Format 2 - "Cars" and "Trucks"/"Heavy Vehicles" sheets, from which only the total is
//!     taken.
//!
//! Anything else is counted as missing.
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};
use thiserror::Error;

pub mod address;
pub mod config;
pub mod extract_from_sheet;
pub mod format;
pub mod geocode;
pub mod locate;
pub mod map;
pub mod normalize;
pub mod pipeline;
pub mod snap;
pub mod tables;
pub mod workbook;

use geocode::GeocodeError;

#[derive(Debug, Error)]
pub enum TmcError {
    #[error("unable to open file: {0}")]
    CannotOpenFile(#[from] io::Error),
    #[error("error reading or writing csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("unable to read workbook: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("unable to read shapefile: {0}")]
    Shapefile(#[from] shapefile::Error),
    #[error("unable to render map: {0}")]
    Template(#[from] rinja::Error),
    #[error("geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("`{file}` could not be parsed: {problem}")]
    Parse { problem: ParseProblem, file: String },
    #[error("unable to compute normalization factor: {0}")]
    NormalizationInput(String),
    #[error("configuration problem: {0}")]
    Config(String),
}

impl TmcError {
    pub fn parse(problem: ParseProblem, file: impl Into<String>) -> Self {
        TmcError::Parse {
            problem,
            file: file.into(),
        }
    }
}

/// Identifying the problem when a filename or a sheet can't be parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseProblem {
    /// Filename has fewer than the three underscore-separated parts needed for an intersection.
    TooFewParts,
    /// Last part of the filename isn't a date.
    InvalidDate(String),
    /// No cell containing "time" in a sheet expected to have a count grid.
    MissingTimeMarker { sheet: String },
    /// No "Start Time" header in the first column of a Format 2 sheet.
    MissingStartTime { sheet: String },
    /// The grand total cell isn't a number.
    InvalidTotal { sheet: String },
    /// A sheet named by the classifier isn't in the workbook.
    MissingSheet(String),
}

impl fmt::Display for ParseProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseProblem::TooFewParts => write!(f, "too few underscore-separated parts"),
            ParseProblem::InvalidDate(v) => write!(f, "invalid date '{v}'"),
            ParseProblem::MissingTimeMarker { sheet } => {
                write!(f, "no 'time' cell found in sheet '{sheet}'")
            }
            ParseProblem::MissingStartTime { sheet } => {
                write!(f, "no 'Start Time' row found in sheet '{sheet}'")
            }
            ParseProblem::InvalidTotal { sheet } => {
                write!(f, "grand total in sheet '{sheet}' is not a number")
            }
            ParseProblem::MissingSheet(v) => write!(f, "no sheet named '{v}'"),
        }
    }
}

/// The direction of travel of a column of counts.
///
/// Format 1 sheets always lay these out in the order of [`Direction::ALL`], immediately to the
/// right of the time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    East,
    South,
    West,
    North,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::North,
    ];

    /// Offset of this direction's column from the time column.
    pub fn column_offset(&self) -> usize {
        match self {
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
            Direction::North => 4,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::East => write!(f, "east"),
            Direction::South => write!(f, "south"),
            Direction::West => write!(f, "west"),
            Direction::North => write!(f, "north"),
        }
    }
}

/// Set up logging to the terminal and to `log_name` in `log_dir`.
pub fn init_logging(log_dir: &Path, log_name: &str) -> Result<(), TmcError> {
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let log_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_dir.join(log_name))?;
    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Debug,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, config, log_file),
    ])
    .map_err(|e| TmcError::Config(format!("could not configure logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_offsets_follow_column_order() {
        let offsets = Direction::ALL
            .iter()
            .map(|d| d.column_offset())
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![1, 2, 3, 4]);
    }

    #[test]
    fn parse_error_names_file_and_problem() {
        let e = TmcError::parse(ParseProblem::TooFewParts, "6822_86.XLS");
        assert_eq!(
            e.to_string(),
            "`6822_86.XLS` could not be parsed: too few underscore-separated parts"
        );
    }
}
