//! Extract counts from the sheets of a TMC workbook.
//!
//! For Format 1 sheets, once the grid has been [located](crate::locate), the layout is:
//!
//! ```text
//! start_row      Time | ...          (header)
//! start_row + 1       | street (E) | street (S) | street (W) | street (N)
//! start_row + 2       | ...          (movement labels)
//! start_row + 3  7:00 | count (E)  | count (S)  | count (W)  | count (N)
//! ...
//! end_row + 1                                              grand total (end_row + 1, end_column + 1)
//! ```
//!
//! The counts are read up to, but not including, `end_row`.
//!
//! Format 2 sheets only provide a total: everything numeric between the "Start Time" header and
//! the first blank row.
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::locate::try_locate;
use crate::tables::CountRow;
use crate::workbook::{Workbook, Worksheet};
use crate::{Direction, ParseProblem, TmcError};

/// Rows between the grid header and the first row of counts.
const HEADER_ROWS: usize = 3;

static ALL_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^all\s").unwrap());
static FIRST_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)").unwrap());

/// Hourly counts in each direction.
///
/// Every field has the same length; this is ensured by reading the grid one row at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountGrid {
    pub times: Vec<String>,
    pub east: Vec<Option<f64>>,
    pub south: Vec<Option<f64>>,
    pub west: Vec<Option<f64>>,
    pub north: Vec<Option<f64>>,
}

impl CountGrid {
    fn push(&mut self, time: String, counts: [Option<f64>; 4]) {
        let [east, south, west, north] = counts;
        self.times.push(time);
        self.east.push(east);
        self.south.push(south);
        self.west.push(west);
        self.north.push(north);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Counts for a direction.
    pub fn direction(&self, direction: Direction) -> &[Option<f64>] {
        match direction {
            Direction::East => &self.east,
            Direction::South => &self.south,
            Direction::West => &self.west,
            Direction::North => &self.north,
        }
    }

    /// Turn into rows of the `all_data` table.
    pub fn into_rows(self, data_id: u32) -> Vec<CountRow> {
        let mut rows = Vec::with_capacity(self.len());
        for (i, times) in self.times.into_iter().enumerate() {
            rows.push(CountRow {
                times,
                east: self.east[i],
                south: self.south[i],
                west: self.west[i],
                north: self.north[i],
                data_id,
            });
        }
        rows
    }
}

/// Street names of the four legs of the intersection, from the row below the grid header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreetNames {
    pub east: String,
    pub south: String,
    pub west: String,
    pub north: String,
}

/// Everything taken from one Format 1 sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSheet {
    pub data_type: String,
    pub grid: CountGrid,
    pub streets: StreetNames,
    pub total: f64,
}

/// Normalize a sheet name into a data type, e.g. "all motors hr." becomes "motors".
pub fn data_type_from_sheet_name(name: &str) -> String {
    let name = ALL_PREFIX.replace(name, "");
    match FIRST_WORD.captures(&name) {
        Some(caps) => caps[1].to_string(),
        None => name.to_string(),
    }
}

/// Extract the grid, street names, and grand total from a Format 1 sheet.
pub fn extract_mode_sheet(sheet: &Worksheet) -> Result<ModeSheet, TmcError> {
    let location = try_locate(sheet)?;
    debug!("Grid of '{}' located at {location:?}", sheet.name());

    let total = sheet
        .cell(location.end_row + 1, location.end_column + 1)
        .number()
        .ok_or_else(|| {
            TmcError::parse(
                ParseProblem::InvalidTotal {
                    sheet: sheet.name().to_string(),
                },
                sheet.name(),
            )
        })?;

    let time_col = location.start_column;
    let mut grid = CountGrid::default();
    for row in (location.start_row + HEADER_ROWS)..location.end_row {
        let counts = Direction::ALL
            .map(|direction| sheet.cell(row, time_col + direction.column_offset()).number());
        grid.push(sheet.cell(row, time_col).text().trim().to_string(), counts);
    }

    let street_row = location.start_row + 1;
    let [east, south, west, north] = Direction::ALL
        .map(|direction| sheet.cell(street_row, time_col + direction.column_offset()).text());

    Ok(ModeSheet {
        data_type: data_type_from_sheet_name(&sheet.name().to_lowercase()),
        grid,
        streets: StreetNames {
            east,
            south,
            west,
            north,
        },
        total,
    })
}

/// Sum the counts of a Format 2 sheet.
///
/// Rows run from just after the "Start Time" row up to the first row with a blank first cell.
/// If there is no such row, the last row of the sheet is left out. Columns run from the second
/// up to the first whose header (in the "Start Time" row) is blank.
pub fn sum_format2_sheet(sheet: &Worksheet) -> Result<f64, TmcError> {
    let mut start_row = None;
    let mut end_row = sheet.nrows().saturating_sub(1);
    for row in 0..sheet.nrows() {
        let value = sheet.cell(row, 0);
        if value.text().trim().eq_ignore_ascii_case("start time") {
            start_row = Some(row + 1);
        } else if value.is_blank() && start_row.is_some() {
            end_row = row;
            break;
        }
    }

    let start_row = start_row.ok_or_else(|| {
        TmcError::parse(
            ParseProblem::MissingStartTime {
                sheet: sheet.name().to_string(),
            },
            sheet.name(),
        )
    })?;

    let mut total = 0.0;
    for col in 1..sheet.ncols() {
        if sheet.cell(start_row - 1, col).is_blank() {
            break;
        }
        total += sheet
            .col_values(col, start_row, end_row)
            .iter()
            .filter_map(|cell| cell.number())
            .sum::<f64>();
    }
    Ok(total)
}

/// Total of the cars and heavy vehicle sheets of a Format 2 workbook.
pub fn format2_total(
    workbook: &Workbook,
    cars: &str,
    heavy_vehicles: &str,
) -> Result<f64, TmcError> {
    let mut total = 0.0;
    for name in [cars, heavy_vehicles] {
        let sheet = workbook.sheet_by_lower_name(name).ok_or_else(|| {
            TmcError::parse(ParseProblem::MissingSheet(name.to_string()), name)
        })?;
        total += sum_format2_sheet(sheet)?;
    }
    Ok(total)
}
